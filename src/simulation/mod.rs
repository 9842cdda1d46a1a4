//! Simulation - stage state machine and stage sequencing
//!
//! - Stage configuration and validation
//! - Built-in challenge presets
//! - Per-stage stochastic simulator
//! - Sequence orchestration and parallel repeated runs

pub mod config;
pub mod presets;
pub mod stage;
pub mod orchestrator;

// Re-export commonly used types
pub use config::{validate_stages, ConfigError, SimulatorSettings, Stage, StageConfig, StageFile};
pub use presets::Preset;
pub use stage::{settle_legs, simulate_stage, DayControl, LegSettlement, StageSimulator, StageState, StageStatus};
pub use orchestrator::{run_repeated, run_sequence, run_sequence_with, trial_rng};
