//! Built-in stage sequences
//!
//! Three-stage challenge: two evaluation phases with a profit target and a
//! funded stage that withdraws profit and resets instead of passing.
//! The hedge account is sized up at each stage.

use super::config::StageConfig;

/// Named preset selectable from the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Preset {
    /// 15K account, one trade per day, 1.2% hedge stop
    #[value(name = "challenge-15k")]
    Challenge15k,
    /// 15K account, three trades per day, 1.0% hedge stop
    #[value(name = "monte-carlo-15k")]
    MonteCarlo15k,
    /// 300K account, five trades per day
    #[value(name = "challenge-300k")]
    Challenge300k,
}

impl Preset {
    pub fn stages(&self) -> Vec<StageConfig> {
        match self {
            Preset::Challenge15k => challenge_15k(),
            Preset::MonteCarlo15k => monte_carlo_15k(),
            Preset::Challenge300k => challenge_300k(),
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Preset::Challenge15k => write!(f, "challenge-15k"),
            Preset::MonteCarlo15k => write!(f, "monte-carlo-15k"),
            Preset::Challenge300k => write!(f, "challenge-300k"),
        }
    }
}

/// Shared rules for every stage of a given account size
struct Account {
    true_capital: f64,
    trade_capital: f64,
    fluctuation: f64,
    max_trades_per_day: u32,
    max_hedge_loss_pct: f64,
}

impl Account {
    fn stage(
        &self,
        name: &str,
        target_profit_pct: f64,
        signup_fee: f64,
        hedge_capital: f64,
        max_days: u32,
        reset_style: bool,
    ) -> StageConfig {
        StageConfig {
            name: name.to_string(),
            true_capital: self.true_capital,
            trade_capital: self.trade_capital,
            fee_rate: 0.00055,
            withdrawable_ratio: if reset_style { 0.8 } else { 0.0 },
            target_profit_pct,
            max_loss_pct: 0.10,
            max_daily_loss_pct: 0.048,
            daily_fluctuation_range: self.fluctuation,
            signup_fee,
            hedge_capital,
            hedge_fee_rate: 0.0005,
            hedge_leverage: 1.0,
            max_hedge_loss_pct: self.max_hedge_loss_pct,
            max_days,
            max_trades_per_day: self.max_trades_per_day,
            min_trade_threshold: 0.005,
            reset_style,
        }
    }
}

/// 15K challenge as run for a single detailed simulation
pub fn challenge_15k() -> Vec<StageConfig> {
    let account = Account {
        true_capital: 15_000.0,
        trade_capital: 13_800.0,
        fluctuation: 0.036,
        max_trades_per_day: 1,
        max_hedge_loss_pct: 0.012,
    };
    vec![
        account.stage("Phase 1", 0.10, 55.0, 1_150.0, 30, false),
        account.stage("Phase 2", 0.05, 0.0, 3_250.0, 30, false),
        account.stage("Funded", 0.10, 0.0, 3_800.0, 0, true),
    ]
}

/// 15K challenge as run in repeated-run mode
pub fn monte_carlo_15k() -> Vec<StageConfig> {
    let account = Account {
        true_capital: 15_000.0,
        trade_capital: 13_800.0,
        fluctuation: 0.036,
        max_trades_per_day: 3,
        max_hedge_loss_pct: 0.01,
    };
    vec![
        account.stage("Phase 1", 0.10, 39.0, 1_150.0, 30, false),
        account.stage("Phase 2", 0.05, 0.0, 3_250.0, 30, false),
        account.stage("Funded", 0.10, 0.0, 3_800.0, 0, true),
    ]
}

/// 300K challenge
pub fn challenge_300k() -> Vec<StageConfig> {
    let account = Account {
        true_capital: 300_000.0,
        trade_capital: 276_000.0,
        fluctuation: 0.036,
        max_trades_per_day: 5,
        max_hedge_loss_pct: 0.012,
    };
    vec![
        account.stage("Phase 1", 0.10, 378.0, 23_000.0, 30, false),
        account.stage("Phase 2", 0.05, 0.0, 65_000.0, 30, false),
        account.stage("Funded", 0.10, 0.0, 76_000.0, 0, true),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_last_stage_is_reset_style() {
        for preset in [Preset::Challenge15k, Preset::MonteCarlo15k, Preset::Challenge300k] {
            let stages = preset.stages();
            assert_eq!(stages.len(), 3);
            assert!(!stages[0].reset_style);
            assert!(!stages[1].reset_style);
            assert!(stages[2].reset_style);
            assert_eq!(stages[2].max_days, 0);
            assert_eq!(stages[2].withdrawable_ratio, 0.8);
        }
    }

    #[test]
    fn test_signup_fee_on_first_stage_only() {
        let stages = monte_carlo_15k();
        assert_eq!(stages[0].signup_fee, 39.0);
        assert_eq!(stages[1].signup_fee, 0.0);
        assert_eq!(stages[2].signup_fee, 0.0);
    }
}
