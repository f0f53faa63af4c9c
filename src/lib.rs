//! Outbreak traceability simulator
//!
//! Models a fresh-produce supply chain at the lot level and measures how
//! much harder an outbreak investigation becomes when distribution centers
//! record calculated lot codes instead of exact ones.
//!
//! # Core Concepts
//!
//! - **Lots**: Traceability lot codes (TLCs) linked into a lineage graph,
//!   with exact links and probabilistic links from calculated hub records
//! - **Contamination**: Seeded at a farm and propagated downstream by
//!   probabilistic union
//! - **Investigation**: Case interviews traced back to farms and scored by
//!   convergence, in deterministic and probabilistic modes
//! - **Monte Carlo**: Many seeded outbreaks aggregated into scope and
//!   identification statistics
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use outbreak_trace::{LineageGraph, Lot};
//!
//! let harvested = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
//! let mut graph = LineageGraph::new();
//! graph.add_lot(Lot::new("FARM-A", harvested));
//! graph.add_lot(Lot::new("DC-1", harvested));
//! graph.link_lots("FARM-A", "DC-1", 0.4);
//!
//! let trace = graph.traceback("DC-1", 0.0, None);
//! assert_eq!(trace.probability("FARM-A"), Some(0.4));
//! assert_eq!(trace.total_scope(), 2);
//! ```

pub mod config;
pub mod contamination;
pub mod exposure;
pub mod flow;
pub mod investigation;
pub mod lineage;
pub mod monte_carlo;
pub mod network;
pub mod simulation;
pub mod transit;

pub use config::{load_config, AppConfig, ConfigError, ConfigResult};
pub use contamination::{
    ContaminationError, ContaminationEvent, ContaminationResult, ContaminationSeeder, ContaminationSummary, LotOrigin,
};
pub use exposure::{CaseGenerator, Exposure, ExposureGenerator, ExposureParams, IllnessCase, PathogenProfile};
pub use flow::{FlowError, FlowOutcome, FlowResult, FlowStats, ProductFlowSimulator};
pub use investigation::{
    compare_investigation_modes, investigate_both_modes, rank_farms, ConvergenceResult, IdentificationOutcome,
    InvestigationEngine, InvestigationResult, InvestigationTimingConfig, ModeComparison, RankedFarm, SuspectTier,
    TraceRecords, TracebackPath,
};
pub use lineage::{Direction, LineageGraph, Lot, ProductCategory, ScopeComparison, Tlc, TracePath, TrackingMode};
pub use monte_carlo::{
    execute_run, start_run, CancellationToken, MonteCarloAggregate, MonteCarloConfig, MonteCarloError,
    MonteCarloResult, MonteCarloStatus, RunId, RunRegistry,
};
pub use network::{NetworkBuilder, NetworkConfig, NodeId, SupplyChainNetwork};
pub use simulation::{OutbreakSimulator, SimulationConfig, SimulationError, SimulationReport, SimulationResult};
pub use transit::TransitConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
