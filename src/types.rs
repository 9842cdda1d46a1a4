use serde::{Deserialize, Serialize};

/// Terminal result of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageResult {
    Passed,
    Failed,
}

impl std::fmt::Display for StageResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageResult::Passed => write!(f, "PASSED"),
            StageResult::Failed => write!(f, "FAILED"),
        }
    }
}

/// Why a stage ended in failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailReason {
    /// Cumulative loss reached the max loss threshold
    MaxLoss,
    /// `max_days` elapsed without reaching the target
    Timeout,
    /// Simulator day cap hit on an otherwise unbounded stage
    SafetyCap,
}

impl std::fmt::Display for FailReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailReason::MaxLoss => write!(f, "max loss"),
            FailReason::Timeout => write!(f, "timeout"),
            FailReason::SafetyCap => write!(f, "safety cap"),
        }
    }
}

/// Kind of event recorded in a stage history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    /// Directional trade settled on both accounts
    Trade,
    /// Move too small to trade, primary fee charged only
    FeeOnly,
    /// Hedge leg hit its per-trade stop, no more trades today
    HedgeStop,
    /// Profit withdrawn and primary equity reset to baseline
    Withdrawal {
        #[serde(rename = "netWithdrawn")]
        net_withdrawn: f64,
    },
    /// Daily loss gate closed, no more trades today
    DailyLossLimit,
}

/// One line of a stage's event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub day: u32,
    pub kind: EventKind,
    /// Price move in percent (move * 100), full precision
    #[serde(rename = "movePct")]
    pub move_pct: f64,
    pub balance: f64,
    #[serde(rename = "hedgeBalance")]
    pub hedge_balance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Immutable result of running one stage to completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutcome {
    pub name: String,
    pub result: StageResult,
    #[serde(rename = "failReason")]
    pub fail_reason: Option<FailReason>,
    #[serde(rename = "daysElapsed")]
    pub days_elapsed: u32,
    /// Directional trades taken (fee-only ticks excluded)
    pub trades: u32,
    #[serde(rename = "finalBalance")]
    pub final_balance: f64,
    #[serde(rename = "finalHedgeBalance")]
    pub final_hedge_balance: f64,
    /// Primary equity above (or below) the current baseline
    #[serde(rename = "primaryPnl")]
    pub primary_pnl: f64,
    #[serde(rename = "primaryReturnPct")]
    pub primary_return_pct: f64,
    #[serde(rename = "hedgePnl")]
    pub hedge_pnl: f64,
    pub withdrawable: f64,
    #[serde(rename = "signupFee")]
    pub signup_fee: f64,
    #[serde(rename = "signupFeeCharged")]
    pub signup_fee_charged: f64,
    /// withdrawable + hedge_pnl - signup_fee_charged
    #[serde(rename = "combinedResult")]
    pub combined_result: f64,
    pub history: Vec<HistoryEntry>,
}

impl StageOutcome {
    pub fn passed(&self) -> bool {
        self.result == StageResult::Passed
    }
}

/// Aggregate of one pass through an ordered stage list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceOutcome {
    pub stages: Vec<StageOutcome>,
    /// Index of the last stage that was run
    #[serde(rename = "stoppedAt")]
    pub stopped_at: usize,
    #[serde(rename = "totalWithdrawable")]
    pub total_withdrawable: f64,
    #[serde(rename = "totalHedgeProfit")]
    pub total_hedge_profit: f64,
    #[serde(rename = "totalSignupFee")]
    pub total_signup_fee: f64,
    #[serde(rename = "totalDays")]
    pub total_days: u32,
    #[serde(rename = "combinedResult")]
    pub combined_result: f64,
}

impl SequenceOutcome {
    /// True when the sequence ended on a failed stage
    pub fn failed(&self) -> bool {
        self.stages.last().map_or(false, |s| !s.passed())
    }
}

/// Samples collected from repeated independent runs of a stage sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepeatedRuns {
    #[serde(rename = "combinedResults")]
    pub combined_results: Vec<f64>,
    #[serde(rename = "totalDays")]
    pub total_days: Vec<u32>,
    /// Per run: index of the stage the sequence stopped at
    #[serde(rename = "stoppedAt")]
    pub stopped_at: Vec<usize>,
    /// Count of runs stopping at each stage index
    #[serde(rename = "stageReached")]
    pub stage_reached: Vec<usize>,
}

impl RepeatedRuns {
    pub fn runs(&self) -> usize {
        self.combined_results.len()
    }
}
