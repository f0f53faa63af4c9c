//! End-to-end outbreak simulation
//!
//! One run builds a network, moves product for the configured period,
//! contaminates a farm, generates illness, and investigates the outbreak
//! in both tracking modes.

mod runner;

pub use runner::{
    default_start_date, seeded_start_date, Conclusion, OutbreakSimulator, SimulationConfig, SimulationMetrics,
    SimulationReport,
};

use crate::config::ConfigError;
use crate::contamination::ContaminationError;
use crate::flow::FlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Contamination(#[from] ContaminationError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("network has no farms to contaminate")]
    EmptyNetwork,
}

pub type SimulationResult<T> = Result<T, SimulationError>;
