//! Investigation effort estimate
//!
//! Record requests are calendar time spent waiting on other firms; the
//! remaining phases are person-hours split across the investigation team.

use super::types::IdentificationOutcome;
use serde::{Deserialize, Serialize};

/// Extra farms verified after a wrong identification
const EXTENDED_VERIFICATION_FARMS: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestigationTimingConfig {
    pub num_investigators: u32,
    /// Direct work hours per investigator per day
    pub direct_work_hours_per_day: f64,
    /// Turnaround for a records request
    pub record_request_turnaround_hours: f64,
    /// Locations that can be contacted at once
    pub parallel_request_capacity: u32,
    pub analysis_hours_per_tlc: f64,
    pub analysis_hours_per_traceback_path: f64,
    pub convergence_analysis_base_hours: f64,
    pub convergence_hours_per_farm: f64,
    pub farm_verification_hours: f64,
    pub max_farms_to_verify: usize,
}

impl Default for InvestigationTimingConfig {
    fn default() -> Self {
        Self {
            num_investigators: 5,
            direct_work_hours_per_day: 6.0,
            record_request_turnaround_hours: 48.0,
            parallel_request_capacity: 10,
            analysis_hours_per_tlc: 0.01,
            analysis_hours_per_traceback_path: 0.005,
            convergence_analysis_base_hours: 16.0,
            convergence_hours_per_farm: 4.0,
            farm_verification_hours: 16.0,
            max_farms_to_verify: 3,
        }
    }
}

/// Hours per phase and the calendar days they add up to
#[derive(Debug, Clone, Default, Serialize)]
pub struct TimingEstimate {
    pub record_request_hours: f64,
    pub tlc_analysis_hours: f64,
    pub traceback_hours: f64,
    pub convergence_analysis_hours: f64,
    pub farm_verification_hours: f64,
    /// Person-hours across the parallelizable phases
    pub total_work_hours: f64,
    pub total_calendar_days: f64,

    pub num_investigators: u32,
    pub direct_work_hours_per_day: f64,

    pub locations_contacted: usize,
    pub tlcs_analyzed: usize,
    pub paths_traced: usize,
    pub farms_evaluated: usize,
    pub farms_verified: usize,
}

/// Scope an investigation has to work through
#[derive(Debug, Clone, Copy, Default)]
pub struct InvestigationScope {
    pub locations_contacted: usize,
    pub tlcs: usize,
    pub paths: usize,
    pub farms: usize,
}

impl InvestigationTimingConfig {
    pub fn estimate(&self, scope: InvestigationScope, outcome: IdentificationOutcome) -> TimingEstimate {
        let capacity = self.parallel_request_capacity.max(1) as usize;
        let request_batches = scope.locations_contacted.div_ceil(capacity);
        let record_request_hours = request_batches as f64 * self.record_request_turnaround_hours;

        let tlc_analysis_hours = scope.tlcs as f64 * self.analysis_hours_per_tlc;
        let traceback_hours = scope.paths as f64 * self.analysis_hours_per_traceback_path;
        let convergence_analysis_hours =
            self.convergence_analysis_base_hours + scope.farms as f64 * self.convergence_hours_per_farm;

        let verify_limit = match outcome {
            IdentificationOutcome::No => self.max_farms_to_verify + EXTENDED_VERIFICATION_FARMS,
            IdentificationOutcome::Yes | IdentificationOutcome::Inconclusive => self.max_farms_to_verify,
        };
        let farms_verified = scope.farms.min(verify_limit);
        let farm_verification_hours = farms_verified as f64 * self.farm_verification_hours;

        let total_work_hours =
            tlc_analysis_hours + traceback_hours + convergence_analysis_hours + farm_verification_hours;
        let team_hours_per_day = f64::from(self.num_investigators) * self.direct_work_hours_per_day;
        let work_days = if team_hours_per_day > 0.0 {
            total_work_hours / team_hours_per_day
        } else {
            0.0
        };

        TimingEstimate {
            record_request_hours,
            tlc_analysis_hours,
            traceback_hours,
            convergence_analysis_hours,
            farm_verification_hours,
            total_work_hours,
            total_calendar_days: record_request_hours / 24.0 + work_days,
            num_investigators: self.num_investigators,
            direct_work_hours_per_day: self.direct_work_hours_per_day,
            locations_contacted: scope.locations_contacted,
            tlcs_analyzed: scope.tlcs,
            paths_traced: scope.paths,
            farms_evaluated: scope.farms,
            farms_verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(locations: usize, tlcs: usize, paths: usize, farms: usize) -> InvestigationScope {
        InvestigationScope {
            locations_contacted: locations,
            tlcs,
            paths,
            farms,
        }
    }

    #[test]
    fn record_requests_batch_by_capacity() {
        let config = InvestigationTimingConfig::default();
        let est = config.estimate(scope(11, 0, 0, 0), IdentificationOutcome::Yes);
        assert_eq!(est.record_request_hours, 96.0);
        let est = config.estimate(scope(10, 0, 0, 0), IdentificationOutcome::Yes);
        assert_eq!(est.record_request_hours, 48.0);
    }

    #[test]
    fn phases_add_up() {
        let config = InvestigationTimingConfig::default();
        let est = config.estimate(scope(4, 100, 200, 2), IdentificationOutcome::Yes);
        assert!((est.tlc_analysis_hours - 1.0).abs() < 1e-12);
        assert!((est.traceback_hours - 1.0).abs() < 1e-12);
        assert_eq!(est.convergence_analysis_hours, 24.0);
        assert_eq!(est.farms_verified, 2);
        assert_eq!(est.farm_verification_hours, 32.0);
        assert!((est.total_work_hours - 58.0).abs() < 1e-9);
        let expected_days = 48.0 / 24.0 + 58.0 / 30.0;
        assert!((est.total_calendar_days - expected_days).abs() < 1e-9);
    }

    #[test]
    fn wrong_identification_verifies_more_farms() {
        let config = InvestigationTimingConfig::default();
        let yes = config.estimate(scope(1, 0, 0, 10), IdentificationOutcome::Yes);
        let inconclusive = config.estimate(scope(1, 0, 0, 10), IdentificationOutcome::Inconclusive);
        let no = config.estimate(scope(1, 0, 0, 10), IdentificationOutcome::No);
        assert_eq!(yes.farms_verified, 3);
        assert_eq!(inconclusive.farms_verified, 3);
        assert_eq!(no.farms_verified, 5);
    }

    #[test]
    fn empty_team_adds_no_work_days() {
        let config = InvestigationTimingConfig {
            num_investigators: 0,
            ..InvestigationTimingConfig::default()
        };
        let est = config.estimate(scope(1, 50, 50, 1), IdentificationOutcome::Yes);
        assert_eq!(est.total_calendar_days, 2.0);
    }
}
