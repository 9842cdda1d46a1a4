// Library crate - exports the stage simulator, orchestration and reporting

pub mod types;
pub mod simulation;
pub mod stats;
pub mod report;

// Re-export commonly used types
pub use types::*;
pub use simulation::{
    run_repeated, run_sequence, simulate_stage, ConfigError, Preset, SimulatorSettings, Stage,
    StageConfig,
};
