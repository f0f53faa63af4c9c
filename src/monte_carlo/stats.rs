//! Aggregate statistics across Monte Carlo iterations

use super::runner::IterationResult;
use crate::investigation::IdentificationOutcome;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// z for a two-sided 95% interval
const Z_95: f64 = 1.96;

/// Descriptive statistics for one metric
///
/// `std` is the population standard deviation. Percentiles interpolate
/// linearly between the closest ranks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricStatistics {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p5: f64,
    pub p25: f64,
    pub p75: f64,
    pub p95: f64,
    pub values: Vec<f64>,
}

impl MetricStatistics {
    /// All zeros for an empty sample
    pub fn from_values(values: Vec<f64>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        Self {
            mean,
            std: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median: percentile(&sorted, 50.0),
            p5: percentile(&sorted, 5.0),
            p25: percentile(&sorted, 25.0),
            p75: percentile(&sorted, 75.0),
            p95: percentile(&sorted, 95.0),
            values,
        }
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }
}

/// Linear-interpolation percentile of an ascending, non-empty slice
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// How often one investigation mode found the true source
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdentificationStatistics {
    pub total: usize,
    pub yes_count: usize,
    pub no_count: usize,
    pub inconclusive_count: usize,
    pub yes_rate: f64,
    pub no_rate: f64,
    pub inconclusive_rate: f64,
    /// Rank of the true source in the ranking; rank 0 (absent) is left out
    pub rank_distribution: BTreeMap<usize, usize>,
    pub mean_rank: f64,
    pub median_rank: f64,
}

impl IdentificationStatistics {
    pub fn from_outcomes(outcomes: &[(IdentificationOutcome, usize)]) -> Self {
        let total = outcomes.len();
        let count = |o: IdentificationOutcome| outcomes.iter().filter(|(x, _)| *x == o).count();
        let (yes_count, no_count, inconclusive_count) = (
            count(IdentificationOutcome::Yes),
            count(IdentificationOutcome::No),
            count(IdentificationOutcome::Inconclusive),
        );
        let rate = |c: usize| if total == 0 { 0.0 } else { c as f64 / total as f64 };

        let mut rank_distribution = BTreeMap::new();
        let mut ranks = Vec::new();
        for &(_, rank) in outcomes.iter().filter(|(_, rank)| *rank > 0) {
            *rank_distribution.entry(rank).or_insert(0) += 1;
            ranks.push(rank as f64);
        }
        let rank_stats = MetricStatistics::from_values(ranks);

        Self {
            total,
            yes_count,
            no_count,
            inconclusive_count,
            yes_rate: rate(yes_count),
            no_rate: rate(no_count),
            inconclusive_rate: rate(inconclusive_count),
            rank_distribution,
            mean_rank: rank_stats.mean,
            median_rank: rank_stats.median,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub level: f64,
}

impl ConfidenceInterval {
    /// Normal-approximation 95% interval for the mean
    pub fn mean_95(stats: &MetricStatistics) -> Self {
        let n = stats.count();
        if n == 0 {
            return Self {
                level: 0.95,
                ..Self::default()
            };
        }
        let half_width = Z_95 * stats.std / (n as f64).sqrt();
        Self {
            lower: stats.mean - half_width,
            upper: stats.mean + half_width,
            level: 0.95,
        }
    }
}

/// Paired test of whether the two modes identify the source equally often
#[derive(Debug, Clone, Copy, Serialize)]
pub struct McNemarTest {
    /// Deterministic identified, probabilistic did not
    pub b: usize,
    /// Probabilistic identified, deterministic did not
    pub c: usize,
    pub chi_squared: f64,
    pub p_value: f64,
    pub significant: bool,
}

/// McNemar's test with continuity correction on paired yes/not-yes results
///
/// `None` when there are no discordant pairs.
pub fn mcnemar(pairs: &[(IdentificationOutcome, IdentificationOutcome)]) -> Option<McNemarTest> {
    let yes = IdentificationOutcome::Yes;
    let b = pairs.iter().filter(|(d, p)| *d == yes && *p != yes).count();
    let c = pairs.iter().filter(|(d, p)| *d != yes && *p == yes).count();
    if b + c == 0 {
        return None;
    }
    let diff = (b as f64 - c as f64).abs() - 1.0;
    let chi_squared = diff * diff / (b + c) as f64;
    // survival function of chi-squared with one degree of freedom
    let p_value = erfc((chi_squared / 2.0).sqrt());
    Some(McNemarTest {
        b,
        c,
        chi_squared,
        p_value,
        significant: p_value < 0.05,
    })
}

/// Complementary error function, fractional error below 1.2e-7
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98 + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let r = t * poly.exp();
    if x >= 0.0 {
        r
    } else {
        2.0 - r
    }
}

/// Statistics over every successful iteration of a run
#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloAggregate {
    pub num_iterations: usize,
    pub num_iterations_completed: usize,
    pub num_iterations_failed: usize,

    pub farm_scope_expansion: MetricStatistics,
    pub tlc_scope_expansion: MetricStatistics,
    pub tlcs_location_expansion: MetricStatistics,
    pub path_expansion: MetricStatistics,
    pub timing_expansion: MetricStatistics,

    pub deterministic_farms: MetricStatistics,
    pub probabilistic_farms: MetricStatistics,
    pub deterministic_tlcs: MetricStatistics,
    pub probabilistic_tlcs: MetricStatistics,
    pub deterministic_tlcs_locations: MetricStatistics,
    pub probabilistic_tlcs_locations: MetricStatistics,
    pub total_cases: MetricStatistics,
    pub deterministic_investigation_days: MetricStatistics,
    pub probabilistic_investigation_days: MetricStatistics,
    pub deterministic_work_hours: MetricStatistics,
    pub probabilistic_work_hours: MetricStatistics,

    pub deterministic_identification: IdentificationStatistics,
    pub probabilistic_identification: IdentificationStatistics,

    pub farm_expansion_ci_95: ConfidenceInterval,
    pub mcnemar: Option<McNemarTest>,
}

impl MonteCarloAggregate {
    pub fn from_results(num_iterations: usize, results: &[IterationResult]) -> Self {
        let metric = |f: fn(&IterationResult) -> f64| MetricStatistics::from_values(results.iter().map(f).collect());
        let farm_scope_expansion = metric(|r| r.farm_scope_expansion);

        let det_outcomes: Vec<_> = results
            .iter()
            .map(|r| (r.deterministic_outcome, r.deterministic_source_rank))
            .collect();
        let prob_outcomes: Vec<_> = results
            .iter()
            .map(|r| (r.probabilistic_outcome, r.probabilistic_source_rank))
            .collect();
        let pairs: Vec<_> = results
            .iter()
            .map(|r| (r.deterministic_outcome, r.probabilistic_outcome))
            .collect();

        Self {
            num_iterations,
            num_iterations_completed: results.len(),
            num_iterations_failed: num_iterations.saturating_sub(results.len()),
            farm_expansion_ci_95: ConfidenceInterval::mean_95(&farm_scope_expansion),
            farm_scope_expansion,
            tlc_scope_expansion: metric(|r| r.tlc_scope_expansion),
            tlcs_location_expansion: metric(|r| r.tlcs_location_expansion),
            path_expansion: metric(|r| r.path_expansion),
            timing_expansion: metric(|r| r.timing_expansion),
            deterministic_farms: metric(|r| r.deterministic_farms as f64),
            probabilistic_farms: metric(|r| r.probabilistic_farms as f64),
            deterministic_tlcs: metric(|r| r.deterministic_tlcs as f64),
            probabilistic_tlcs: metric(|r| r.probabilistic_tlcs as f64),
            deterministic_tlcs_locations: metric(|r| r.deterministic_tlcs_locations as f64),
            probabilistic_tlcs_locations: metric(|r| r.probabilistic_tlcs_locations as f64),
            total_cases: metric(|r| r.total_cases as f64),
            deterministic_investigation_days: metric(|r| r.deterministic_investigation_days),
            probabilistic_investigation_days: metric(|r| r.probabilistic_investigation_days),
            deterministic_work_hours: metric(|r| r.deterministic_work_hours),
            probabilistic_work_hours: metric(|r| r.probabilistic_work_hours),
            deterministic_identification: IdentificationStatistics::from_outcomes(&det_outcomes),
            probabilistic_identification: IdentificationStatistics::from_outcomes(&prob_outcomes),
            mcnemar: mcnemar(&pairs),
        }
    }
}
