//! Outbreak investigation: case traceback, convergence, and scoring
//!
//! The same engine runs in both tracking modes. Deterministic mode follows
//! only exact lot links; probabilistic mode also follows every lot a hub
//! said it might have shipped.

mod compare;
mod engine;
mod outcome;
mod timing;
mod types;

pub use compare::{
    compare_investigation_modes, investigate_both_modes, ComparedInvestigations, ExpansionMetrics, ModeComparison,
    ModeSummary,
};
pub use engine::{InvestigationEngine, TraceRecords, DEFAULT_MIN_PROBABILITY, DEFAULT_RECORD_WINDOW_DAYS};
pub use outcome::{
    classify, confidence_score, rank_farms, Classification, RankedFarm, SuspectTier,
    IDENTIFICATION_CONFIDENCE_THRESHOLD, TIER_CONFIDENCE_GAP, TIER_MEANINGFUL_SCORE,
};
pub use timing::{InvestigationScope, InvestigationTimingConfig, TimingEstimate};
pub use types::{ConvergenceResult, IdentificationOutcome, InvestigationResult, TracebackNode, TracebackPath};
