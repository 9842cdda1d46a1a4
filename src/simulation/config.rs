//! Stage configuration and validation

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rules and account sizing for one challenge stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage name (e.g., "Phase 1")
    pub name: String,

    /// Evaluation baseline equity
    pub true_capital: f64,

    /// Order notional on the primary account
    pub trade_capital: f64,

    /// Primary fee rate per side (charged on open and close)
    pub fee_rate: f64,

    /// Share of excess profit paid out on withdrawal (reset-style stages only)
    #[serde(default)]
    pub withdrawable_ratio: f64,

    /// Profit target as a fraction of true capital
    pub target_profit_pct: f64,

    /// Max total loss as a fraction of true capital
    pub max_loss_pct: f64,

    /// Daily gate on the sum of adverse move magnitudes
    pub max_daily_loss_pct: f64,

    /// Moves are drawn uniformly from [-range, +range]
    pub daily_fluctuation_range: f64,

    /// One-time fee, charged when the stage fails
    #[serde(default)]
    pub signup_fee: f64,

    /// Hedge account notional
    pub hedge_capital: f64,

    /// Hedge fee rate per side
    pub hedge_fee_rate: f64,

    /// Hedge leverage (scales the hedge fee)
    pub hedge_leverage: f64,

    /// Per-trade hedge stop as a fraction of hedge capital
    pub max_hedge_loss_pct: f64,

    /// Day limit, 0 = unbounded
    #[serde(default)]
    pub max_days: u32,

    pub max_trades_per_day: u32,

    /// Moves smaller than this are fee-only ticks
    #[serde(default)]
    pub min_trade_threshold: f64,

    /// Withdraw-and-reset on target instead of passing
    #[serde(default)]
    pub reset_style: bool,
}

impl StageConfig {
    /// Round-trip fee on the primary account
    pub fn primary_fee(&self) -> f64 {
        self.trade_capital * self.fee_rate * 2.0
    }

    /// Round-trip fee on the hedge account
    pub fn hedge_fee(&self) -> f64 {
        self.hedge_capital * self.hedge_leverage * self.hedge_fee_rate * 2.0
    }

    /// Largest loss the hedge leg may take on one trade
    pub fn max_hedge_loss(&self) -> f64 {
        self.hedge_capital * self.max_hedge_loss_pct
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }

        let fields = [
            ("true_capital", self.true_capital),
            ("trade_capital", self.trade_capital),
            ("fee_rate", self.fee_rate),
            ("withdrawable_ratio", self.withdrawable_ratio),
            ("target_profit_pct", self.target_profit_pct),
            ("max_loss_pct", self.max_loss_pct),
            ("max_daily_loss_pct", self.max_daily_loss_pct),
            ("daily_fluctuation_range", self.daily_fluctuation_range),
            ("signup_fee", self.signup_fee),
            ("hedge_capital", self.hedge_capital),
            ("hedge_fee_rate", self.hedge_fee_rate),
            ("hedge_leverage", self.hedge_leverage),
            ("max_hedge_loss_pct", self.max_hedge_loss_pct),
            ("min_trade_threshold", self.min_trade_threshold),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite {
                    stage: self.name.clone(),
                    field,
                    value,
                });
            }
        }

        let positive = [
            ("true_capital", self.true_capital),
            ("trade_capital", self.trade_capital),
            ("target_profit_pct", self.target_profit_pct),
            ("max_loss_pct", self.max_loss_pct),
            ("max_daily_loss_pct", self.max_daily_loss_pct),
            ("daily_fluctuation_range", self.daily_fluctuation_range),
            ("hedge_capital", self.hedge_capital),
            ("hedge_leverage", self.hedge_leverage),
            ("max_hedge_loss_pct", self.max_hedge_loss_pct),
        ];
        for (field, value) in positive {
            if value <= 0.0 {
                return Err(ConfigError::NotPositive {
                    stage: self.name.clone(),
                    field,
                    value,
                });
            }
        }

        let non_negative = [
            ("fee_rate", self.fee_rate),
            ("hedge_fee_rate", self.hedge_fee_rate),
            ("signup_fee", self.signup_fee),
            ("min_trade_threshold", self.min_trade_threshold),
        ];
        for (field, value) in non_negative {
            if value < 0.0 {
                return Err(ConfigError::Negative {
                    stage: self.name.clone(),
                    field,
                    value,
                });
            }
        }

        if self.max_trades_per_day == 0 {
            return Err(ConfigError::NoTradesPerDay(self.name.clone()));
        }

        if !(0.0..=1.0).contains(&self.withdrawable_ratio) {
            return Err(ConfigError::OutOfRange {
                stage: self.name.clone(),
                field: "withdrawable_ratio",
                value: self.withdrawable_ratio,
            });
        }

        if self.max_loss_pct > 1.0 {
            return Err(ConfigError::OutOfRange {
                stage: self.name.clone(),
                field: "max_loss_pct",
                value: self.max_loss_pct,
            });
        }

        Ok(())
    }
}

/// Rejected stage configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("stage name must not be empty")]
    EmptyName,

    #[error("stage '{stage}': {field} must be finite, got {value}")]
    NotFinite {
        stage: String,
        field: &'static str,
        value: f64,
    },

    #[error("stage '{stage}': {field} must be > 0, got {value}")]
    NotPositive {
        stage: String,
        field: &'static str,
        value: f64,
    },

    #[error("stage '{stage}': {field} must be >= 0, got {value}")]
    Negative {
        stage: String,
        field: &'static str,
        value: f64,
    },

    #[error("stage '{stage}': {field} must be within [0, 1], got {value}")]
    OutOfRange {
        stage: String,
        field: &'static str,
        value: f64,
    },

    #[error("stage '{0}': max_trades_per_day must be at least 1")]
    NoTradesPerDay(String),
}

/// A stage whose configuration passed validation
///
/// The simulator only accepts `Stage`, so every run starts from a config
/// that satisfies the invariants checked in [`StageConfig::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    config: StageConfig,
}

impl Stage {
    pub fn new(config: StageConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }
}

impl TryFrom<StageConfig> for Stage {
    type Error = ConfigError;

    fn try_from(config: StageConfig) -> Result<Self, Self::Error> {
        Stage::new(config)
    }
}

/// Validate a whole stage list, failing on the first bad entry
pub fn validate_stages(configs: Vec<StageConfig>) -> Result<Vec<Stage>, ConfigError> {
    configs.into_iter().map(Stage::new).collect()
}

/// On-disk shape of a stage list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFile {
    pub stages: Vec<StageConfig>,
}

/// Knobs that apply to the simulator rather than to a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorSettings {
    /// Hard day limit, applied only to stages with `max_days == 0`
    pub day_cap: u32,
    /// Keep the per-event log in each outcome
    pub record_history: bool,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            day_cap: 100_000,
            record_history: true,
        }
    }
}

impl SimulatorSettings {
    /// Settings for bulk runs where only the totals are used
    pub fn bulk() -> Self {
        Self {
            record_history: false,
            ..Default::default()
        }
    }
}
