//! Deterministic vs probabilistic investigation of the same outbreak

use super::engine::{InvestigationEngine, TraceRecords, DEFAULT_MIN_PROBABILITY};
use super::timing::{InvestigationTimingConfig, TimingEstimate};
use super::types::{IdentificationOutcome, InvestigationResult};
use crate::exposure::IllnessCase;
use crate::lineage::TrackingMode;
use crate::network::NodeId;
use serde::Serialize;

/// Headline metrics of one mode's investigation
#[derive(Debug, Clone, Serialize)]
pub struct ModeSummary {
    pub farms_in_scope: usize,
    pub tlcs_in_scope: usize,
    pub tlcs_locations: usize,
    pub traceback_paths: usize,
    pub primary_suspect: Option<String>,
    pub primary_suspect_probability: f64,
    pub primary_suspect_confidence: f64,
    pub identification_outcome: IdentificationOutcome,
    pub source_rank: usize,
    pub top_two_margin: f64,
    pub average_path_probability: f64,
    pub convergence_results: usize,
    pub investigation_timing: TimingEstimate,
}

impl From<&InvestigationResult> for ModeSummary {
    fn from(result: &InvestigationResult) -> Self {
        Self {
            farms_in_scope: result.farms_in_scope,
            tlcs_in_scope: result.tlcs_in_scope,
            tlcs_locations: result.tlcs_in_scope_locations,
            traceback_paths: result.total_traceback_paths,
            primary_suspect: result.primary_suspect_farm_name.clone(),
            primary_suspect_probability: result.primary_suspect_probability,
            primary_suspect_confidence: result.primary_confidence(),
            identification_outcome: result.identification_outcome,
            source_rank: result.source_rank,
            top_two_margin: result.top_two_margin,
            average_path_probability: result.average_path_probability,
            convergence_results: result.convergence_results.len(),
            investigation_timing: result.timing_estimate.clone(),
        }
    }
}

/// How much wider the probabilistic investigation is
#[derive(Debug, Clone, Serialize)]
pub struct ExpansionMetrics {
    pub farm_scope_expansion: f64,
    pub tlc_scope_expansion: f64,
    pub tlcs_location_expansion: f64,
    pub path_expansion: f64,
    pub timing_expansion: f64,
    pub deterministic_outcome: IdentificationOutcome,
    pub probabilistic_outcome: IdentificationOutcome,
    /// Deterministic top confidence minus probabilistic top confidence
    pub confidence_difference: f64,
}

impl ExpansionMetrics {
    pub fn between(det: &InvestigationResult, prob: &InvestigationResult) -> Self {
        let ratio = |p: usize, d: usize| p as f64 / d.max(1) as f64;
        Self {
            farm_scope_expansion: ratio(prob.farms_in_scope, det.farms_in_scope),
            tlc_scope_expansion: ratio(prob.tlcs_in_scope, det.tlcs_in_scope),
            tlcs_location_expansion: ratio(prob.tlcs_in_scope_locations, det.tlcs_in_scope_locations),
            path_expansion: ratio(prob.total_traceback_paths, det.total_traceback_paths),
            timing_expansion: prob.timing_estimate.total_calendar_days
                / det.timing_estimate.total_calendar_days.max(0.1),
            deterministic_outcome: det.identification_outcome,
            probabilistic_outcome: prob.identification_outcome,
            confidence_difference: det.primary_confidence() - prob.primary_confidence(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModeComparison {
    pub deterministic: ModeSummary,
    pub probabilistic: ModeSummary,
    pub comparison: ExpansionMetrics,
}

/// Both investigations with their comparison
#[derive(Debug, Clone)]
pub struct ComparedInvestigations {
    pub deterministic: InvestigationResult,
    pub probabilistic: InvestigationResult,
}

impl ComparedInvestigations {
    pub fn summary(&self) -> ModeComparison {
        ModeComparison {
            deterministic: ModeSummary::from(&self.deterministic),
            probabilistic: ModeSummary::from(&self.probabilistic),
            comparison: ExpansionMetrics::between(&self.deterministic, &self.probabilistic),
        }
    }
}

/// Investigate the same cases under both tracking modes
///
/// The deterministic run follows only exact links (floor 1.0). The
/// probabilistic run expands hub distributions with a 0.01 floor.
pub fn investigate_both_modes(
    records: TraceRecords<'_>,
    cases: &[IllnessCase],
    actual_source: Option<NodeId>,
    record_window_days: i64,
    timing: &InvestigationTimingConfig,
) -> ComparedInvestigations {
    let deterministic = InvestigationEngine::new(records, TrackingMode::Deterministic)
        .record_window(record_window_days)
        .timing(timing.clone())
        .investigate(cases, actual_source, 1.0);
    let probabilistic = InvestigationEngine::new(records, TrackingMode::Probabilistic)
        .record_window(record_window_days)
        .timing(timing.clone())
        .investigate(cases, actual_source, DEFAULT_MIN_PROBABILITY);
    ComparedInvestigations {
        deterministic,
        probabilistic,
    }
}

pub fn compare_investigation_modes(
    records: TraceRecords<'_>,
    cases: &[IllnessCase],
    actual_source: Option<NodeId>,
    record_window_days: i64,
    timing: &InvestigationTimingConfig,
) -> ModeComparison {
    investigate_both_modes(records, cases, actual_source, record_window_days, timing).summary()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(farms: usize, tlcs: usize, paths: usize, days: f64) -> InvestigationResult {
        InvestigationResult {
            mode: TrackingMode::Deterministic,
            total_cases_investigated: 0,
            cases_interviewed: 0,
            convergence_results: Vec::new(),
            primary_suspect_farm_id: None,
            primary_suspect_farm_name: None,
            primary_suspect_probability: 0.0,
            farms_in_scope: farms,
            tlcs_in_scope: tlcs,
            tlcs_in_scope_locations: farms,
            total_traceback_paths: paths,
            average_path_probability: 1.0,
            min_path_probability: 1.0,
            actual_source_farm_id: None,
            identification_outcome: IdentificationOutcome::Inconclusive,
            source_rank: 0,
            top_two_margin: 0.0,
            timing_estimate: TimingEstimate {
                total_calendar_days: days,
                ..TimingEstimate::default()
            },
        }
    }

    #[test]
    fn ratios_guard_zero_denominators() {
        let det = result(0, 0, 0, 0.0);
        let prob = result(3, 12, 40, 2.0);
        let m = ExpansionMetrics::between(&det, &prob);
        assert_eq!(m.farm_scope_expansion, 3.0);
        assert_eq!(m.tlc_scope_expansion, 12.0);
        assert_eq!(m.path_expansion, 40.0);
        assert_eq!(m.timing_expansion, 20.0);
        assert_eq!(m.confidence_difference, 0.0);
    }

    #[test]
    fn ratios_scale_by_deterministic_scope() {
        let det = result(2, 10, 20, 4.0);
        let prob = result(4, 25, 60, 6.0);
        let m = ExpansionMetrics::between(&det, &prob);
        assert_eq!(m.farm_scope_expansion, 2.0);
        assert_eq!(m.tlc_scope_expansion, 2.5);
        assert_eq!(m.path_expansion, 3.0);
        assert_eq!(m.timing_expansion, 1.5);
    }
}
