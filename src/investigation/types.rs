//! Investigation result types

use super::timing::TimingEstimate;
use crate::lineage::{Tlc, TrackingMode};
use crate::network::{NodeId, NodeType};
use serde::Serialize;
use std::fmt;

/// Whether an investigation named the true source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentificationOutcome {
    /// Correct farm ranked first with a clear margin
    Yes,
    /// Wrong farm ranked first with a clear margin
    No,
    /// Top candidates too close to call
    #[default]
    Inconclusive,
}

impl IdentificationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Inconclusive => "inconclusive",
        }
    }
}

impl fmt::Display for IdentificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One supply-chain hop on a traceback path
#[derive(Debug, Clone, Serialize)]
pub struct TracebackNode {
    pub node_id: NodeId,
    pub node_name: String,
    pub node_type: NodeType,
    pub tlc: Tlc,
    pub probability: f64,
}

/// A farm-terminated path from a TLC found in a location's records
#[derive(Debug, Clone, Serialize)]
pub struct TracebackPath {
    pub starting_location_id: NodeId,
    pub starting_tlc: Tlc,
    pub nodes: Vec<TracebackNode>,
    /// Hub delivery probability times graph traceback probability
    pub path_probability: f64,
    pub terminal_farm_id: NodeId,
    pub terminal_farm_name: String,
}

/// Evidence that cases converge on one farm
#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceResult {
    pub farm_id: NodeId,
    pub farm_name: String,
    /// Distinct cases with at least one path to this farm
    pub cases_converging: usize,
    /// Cases whose paths reach this farm and no other
    pub exclusive_cases: usize,
    /// Cases that reached any farm
    pub total_cases_analyzed: usize,
    pub tlcs_converging: Vec<Tlc>,
    pub retail_locations_converging: Vec<NodeId>,
    /// Geometric mean of path probabilities; 1.0 in deterministic mode
    pub convergence_probability: f64,
    pub confidence_score: f64,
}

impl ConvergenceResult {
    pub fn case_coverage_pct(&self) -> f64 {
        percent(self.cases_converging, self.total_cases_analyzed)
    }

    pub fn exclusive_case_pct(&self) -> f64 {
        percent(self.exclusive_cases, self.total_cases_analyzed)
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Full outcome of one investigation run
#[derive(Debug, Clone, Serialize)]
pub struct InvestigationResult {
    pub mode: TrackingMode,
    pub total_cases_investigated: usize,
    /// Cases with a usable interview
    pub cases_interviewed: usize,
    pub convergence_results: Vec<ConvergenceResult>,

    pub primary_suspect_farm_id: Option<NodeId>,
    pub primary_suspect_farm_name: Option<String>,
    pub primary_suspect_probability: f64,

    pub farms_in_scope: usize,
    pub tlcs_in_scope: usize,
    /// Distinct GLNs where in-scope TLCs were assigned
    pub tlcs_in_scope_locations: usize,
    pub total_traceback_paths: usize,
    pub average_path_probability: f64,
    pub min_path_probability: f64,

    pub actual_source_farm_id: Option<NodeId>,
    pub identification_outcome: IdentificationOutcome,
    /// 1-based rank of the true source; 0 when it never appears
    pub source_rank: usize,
    pub top_two_margin: f64,

    pub timing_estimate: TimingEstimate,
}

impl InvestigationResult {
    pub fn is_probabilistic_mode(&self) -> bool {
        self.mode == TrackingMode::Probabilistic
    }

    /// Confidence of the top-ranked farm, 0.0 when nothing converged
    pub fn primary_confidence(&self) -> f64 {
        self.convergence_results
            .first()
            .map_or(0.0, |r| r.confidence_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_is_zero_without_analyzed_cases() {
        let result = ConvergenceResult {
            farm_id: NodeId::new(),
            farm_name: "Farm".into(),
            cases_converging: 0,
            exclusive_cases: 0,
            total_cases_analyzed: 0,
            tlcs_converging: Vec::new(),
            retail_locations_converging: Vec::new(),
            convergence_probability: 1.0,
            confidence_score: 0.0,
        };
        assert_eq!(result.case_coverage_pct(), 0.0);
        assert_eq!(result.exclusive_case_pct(), 0.0);
    }

    #[test]
    fn outcome_serializes_lowercase() {
        let json = serde_json::to_string(&IdentificationOutcome::Inconclusive).unwrap();
        assert_eq!(json, "\"inconclusive\"");
        assert_eq!(IdentificationOutcome::Yes.to_string(), "yes");
    }
}
