//! Product flow: harvests, shipments, transformations, and node inventory

mod inventory;
mod simulator;

pub use inventory::{calculated_weights, in_window, take_fifo, InventoryRecord, NodeInventory, Selection};
pub use simulator::{FlowOutcome, FlowStats, ProductFlowSimulator, ProductionBatch, Shipment, ShipmentMap};

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised when configuring a flow simulation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    #[error("end_date ({end}) must be >= start_date ({start})")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

/// Result type for flow operations
pub type FlowResult<T> = Result<T, FlowError>;
