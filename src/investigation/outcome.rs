//! Scoring, identification outcome, and suspect tiers

use super::types::{ConvergenceResult, IdentificationOutcome};
use crate::network::NodeId;
use serde::Serialize;

/// Minimum lead of the top farm over the runner-up for a conclusive call
pub const IDENTIFICATION_CONFIDENCE_THRESHOLD: f64 = 0.05;

/// Gap below which two farms are indistinguishable when tiering
pub const TIER_CONFIDENCE_GAP: f64 = 0.10;

/// Confidence at which a non-leading farm still cannot be ruled out
pub const TIER_MEANINGFUL_SCORE: f64 = 0.20;

const EXCLUSIVE_WEIGHT: f64 = 0.50;
const COVERAGE_WEIGHT: f64 = 0.30;
const LOCATION_WEIGHT: f64 = 0.15;
const PROBABILITY_WEIGHT: f64 = 0.05;

/// Weighted confidence that a farm is the source, in `[0, 1]`
///
/// Exclusive cases dominate because only one farm can explain them.
pub fn confidence_score(
    exclusive_coverage: f64,
    case_coverage: f64,
    location_diversity: f64,
    aggregate_probability: f64,
) -> f64 {
    let score = EXCLUSIVE_WEIGHT * exclusive_coverage
        + COVERAGE_WEIGHT * case_coverage
        + LOCATION_WEIGHT * location_diversity
        + PROBABILITY_WEIGHT * aggregate_probability;
    score.clamp(0.0, 1.0)
}

/// Identification verdict against ground truth
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Classification {
    pub outcome: IdentificationOutcome,
    pub source_rank: usize,
    pub top_two_margin: f64,
}

/// Classify a sorted convergence ranking
///
/// The margin check comes first: a correct farm that leads by less than
/// [`IDENTIFICATION_CONFIDENCE_THRESHOLD`] is still inconclusive.
pub fn classify(results: &[ConvergenceResult], actual_source: Option<NodeId>) -> Classification {
    let (Some(actual), Some(top)) = (actual_source, results.first()) else {
        return Classification::default();
    };

    let source_rank = results
        .iter()
        .position(|r| r.farm_id == actual)
        .map_or(0, |i| i + 1);
    let second = results.get(1).map_or(0.0, |r| r.confidence_score);
    let margin = top.confidence_score - second;

    let outcome = if margin < IDENTIFICATION_CONFIDENCE_THRESHOLD {
        IdentificationOutcome::Inconclusive
    } else if top.farm_id == actual {
        IdentificationOutcome::Yes
    } else {
        IdentificationOutcome::No
    };

    Classification {
        outcome,
        source_rank,
        top_two_margin: margin,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SuspectTier {
    #[serde(rename = "Primary Suspect")]
    PrimarySuspect,
    #[serde(rename = "Cannot Rule Out")]
    CannotRuleOut,
    Unlikely,
}

impl SuspectTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimarySuspect => "Primary Suspect",
            Self::CannotRuleOut => "Cannot Rule Out",
            Self::Unlikely => "Unlikely",
        }
    }

    pub fn assign(rank: usize, score: f64, top_score: f64, exclusive_cases: usize, has_clear_leader: bool) -> Self {
        if rank == 1 {
            if has_clear_leader || exclusive_cases > 0 {
                Self::PrimarySuspect
            } else {
                Self::CannotRuleOut
            }
        } else if top_score - score <= TIER_CONFIDENCE_GAP {
            Self::CannotRuleOut
        } else if score >= TIER_MEANINGFUL_SCORE || exclusive_cases > 0 {
            Self::CannotRuleOut
        } else {
            Self::Unlikely
        }
    }
}

/// A convergence row with its rank and tier
#[derive(Debug, Clone, Serialize)]
pub struct RankedFarm {
    pub rank: usize,
    pub tier: SuspectTier,
    pub farm_id: NodeId,
    pub farm_name: String,
    pub confidence_score: f64,
    pub cases_converging: usize,
    pub exclusive_cases: usize,
    pub case_coverage_pct: f64,
    pub exclusive_case_pct: f64,
    pub is_actual_source: bool,
}

/// Tier every farm in a sorted convergence ranking
pub fn rank_farms(results: &[ConvergenceResult], actual_source: Option<NodeId>) -> Vec<RankedFarm> {
    let Some(top) = results.first() else {
        return Vec::new();
    };
    let top_score = top.confidence_score;
    let second = results.get(1).map_or(0.0, |r| r.confidence_score);
    let has_clear_leader = top_score - second > TIER_CONFIDENCE_GAP;

    results
        .iter()
        .enumerate()
        .map(|(i, r)| RankedFarm {
            rank: i + 1,
            tier: SuspectTier::assign(i + 1, r.confidence_score, top_score, r.exclusive_cases, has_clear_leader),
            farm_id: r.farm_id,
            farm_name: r.farm_name.clone(),
            confidence_score: r.confidence_score,
            cases_converging: r.cases_converging,
            exclusive_cases: r.exclusive_cases,
            case_coverage_pct: r.case_coverage_pct(),
            exclusive_case_pct: r.exclusive_case_pct(),
            is_actual_source: actual_source == Some(r.farm_id),
        })
        .collect()
}
