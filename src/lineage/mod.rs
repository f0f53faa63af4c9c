//! Lot lineage: traceability lots and the weighted derivation graph

mod graph;
mod lot;
mod path;
pub mod probability;
mod trace;


pub use graph::{LineageGraph, ScopeComparison};
pub use lot::{Lot, ProductCategory, Tlc, TrackingMode};
pub use path::{Direction, TracePath};
pub use trace::TraceQuery;
