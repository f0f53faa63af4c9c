//! Monte Carlo batches of outbreak simulations
//!
//! Each iteration is an independent seeded run of the full pipeline. Runs
//! live in a [`RunRegistry`] that tracks progress, supports cancellation,
//! and holds the aggregate once every iteration has finished.

mod cancel;
mod registry;
mod runner;
mod stats;

pub use cancel::CancellationToken;
pub use registry::{MonteCarloRun, MonteCarloStatus, RunId, RunProgress, RunRegistry, MAX_STORED_RUNS};
pub use runner::{execute_run, run_iteration, start_run, IterationResult};
pub use stats::{
    erfc, mcnemar, ConfidenceInterval, IdentificationStatistics, McNemarTest, MetricStatistics, MonteCarloAggregate,
};

use crate::config::{check_at_least_one, check_rate, ConfigError, ConfigResult};
use crate::exposure::PathogenProfile;
use crate::network::{AssignmentMode, CalculatedMethod, NetworkConfig};
use crate::simulation::{default_start_date, SimulationConfig};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on concurrent iterations
pub const MAX_WORKERS: usize = 8;

#[derive(Debug, Error)]
pub enum MonteCarloError {
    #[error("Monte Carlo run not found: {0}")]
    RunNotFound(RunId),

    #[error("Monte Carlo run {id} is {status}; results are only available once completed")]
    RunNotComplete { id: RunId, status: MonteCarloStatus },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type MonteCarloResult<T> = Result<T, MonteCarloError>;

/// Batch parameters; each iteration builds its own network
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub num_farms: usize,
    pub num_packers: usize,
    pub num_distribution_centers: usize,
    pub num_retailers: usize,
    pub retailers_with_delis_pct: f64,
    pub contamination_rate: f64,
    pub contamination_duration_days: i64,
    pub pathogen: String,
    /// Calculated lot code method at distribution centers, e.g. `fifo`
    pub calculated_strategy: CalculatedMethod,
    pub date_window_days: u32,
    /// First simulated day of every iteration; see [`default_start_date`] when unset
    pub start_date: Option<NaiveDate>,
    pub simulation_days: i64,
    pub interview_success_rate: f64,
    pub record_collection_window_days: i64,
    pub num_iterations: usize,
    /// Iteration `i` is seeded with `base + i`
    pub base_random_seed: Option<u64>,
    pub num_workers: Option<usize>,
    pub iteration_timeout_secs: u64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            num_farms: 5,
            num_packers: 2,
            num_distribution_centers: 3,
            num_retailers: 20,
            retailers_with_delis_pct: 0.3,
            contamination_rate: 1.0,
            contamination_duration_days: 7,
            pathogen: "Salmonella".to_string(),
            calculated_strategy: CalculatedMethod::FifoDateRange,
            date_window_days: 7,
            start_date: None,
            simulation_days: 90,
            interview_success_rate: 0.7,
            record_collection_window_days: 14,
            num_iterations: 1000,
            base_random_seed: None,
            num_workers: None,
            iteration_timeout_secs: 300,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        check_rate("monte_carlo.contamination_rate", self.contamination_rate)?;
        check_rate("monte_carlo.interview_success_rate", self.interview_success_rate)?;
        check_rate("monte_carlo.retailers_with_delis_pct", self.retailers_with_delis_pct)?;
        check_at_least_one("monte_carlo.num_farms", self.num_farms)?;
        check_at_least_one("monte_carlo.num_retailers", self.num_retailers)?;
        check_at_least_one("monte_carlo.num_iterations", self.num_iterations)?;
        if let Some(workers) = self.num_workers {
            check_at_least_one("monte_carlo.num_workers", workers)?;
        }
        if self.iteration_timeout_secs == 0 {
            return Err(ConfigError::Invalid("monte_carlo.iteration_timeout_secs must be at least 1".into()));
        }
        if self.simulation_days < 0 || self.contamination_duration_days < 0 {
            return Err(ConfigError::Invalid("monte_carlo day counts must not be negative".into()));
        }
        Ok(())
    }

    /// Shared first day of every iteration in a run
    pub fn resolved_start_date(&self) -> NaiveDate {
        self.start_date
            .unwrap_or_else(|| default_start_date(self.base_random_seed.is_some(), self.simulation_days))
    }

    /// Concurrent iterations: configured, or one less than the CPU count
    pub fn worker_count(&self) -> usize {
        let workers = self.num_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
        });
        workers.clamp(1, MAX_WORKERS)
    }

    /// The single-run configuration for one iteration
    pub fn to_simulation_config(&self, seed: u64, start_date: NaiveDate) -> SimulationConfig {
        let defaults = SimulationConfig::default();
        SimulationConfig {
            start_date: Some(start_date),
            simulation_days: self.simulation_days,
            network: NetworkConfig {
                num_farms: self.num_farms,
                num_packers: self.num_packers,
                num_distribution_centers: self.num_distribution_centers,
                num_retailers: self.num_retailers,
                retailers_with_delis_pct: self.retailers_with_delis_pct,
                dc_tracking_mode: AssignmentMode::Calculated,
                dc_calculated_method: self.calculated_strategy,
                dc_date_window_days: self.date_window_days,
                ..NetworkConfig::default()
            },
            contamination_duration_days: self.contamination_duration_days,
            contamination_rate: self.contamination_rate,
            pathogen: PathogenProfile {
                name: self.pathogen.clone(),
                ..PathogenProfile::default()
            },
            interview_success_rate: self.interview_success_rate,
            record_collection_window_days: self.record_collection_window_days,
            random_seed: Some(seed),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_is_capped() {
        let config = MonteCarloConfig {
            num_workers: Some(64),
            ..MonteCarloConfig::default()
        };
        assert_eq!(config.worker_count(), MAX_WORKERS);
        let config = MonteCarloConfig {
            num_workers: Some(3),
            ..MonteCarloConfig::default()
        };
        assert_eq!(config.worker_count(), 3);
    }

    #[test]
    fn default_worker_count_is_in_range() {
        let workers = MonteCarloConfig::default().worker_count();
        assert!((1..=MAX_WORKERS).contains(&workers));
    }

    #[test]
    fn zero_iterations_is_invalid() {
        let config = MonteCarloConfig {
            num_iterations: 0,
            ..MonteCarloConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn iteration_config_carries_strategy_and_seed() {
        let config = MonteCarloConfig {
            calculated_strategy: CalculatedMethod::InventoryWeighted,
            date_window_days: 3,
            ..MonteCarloConfig::default()
        };
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let sim = config.to_simulation_config(99, start);
        assert_eq!(sim.random_seed, Some(99));
        assert_eq!(sim.start_date, Some(start));
        assert_eq!(sim.network.dc_tracking_mode, AssignmentMode::Calculated);
        assert_eq!(sim.network.dc_calculated_method, CalculatedMethod::InventoryWeighted);
        assert_eq!(sim.network.dc_date_window_days, 3);
        assert_eq!(sim.simulation_days, 90);
    }

    #[test]
    fn seeded_batch_starts_on_fixed_day() {
        let config = MonteCarloConfig {
            base_random_seed: Some(5),
            ..MonteCarloConfig::default()
        };
        assert_eq!(config.resolved_start_date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        let start = NaiveDate::from_ymd_opt(2023, 5, 1).unwrap();
        let pinned = MonteCarloConfig {
            start_date: Some(start),
            ..config
        };
        assert_eq!(pinned.resolved_start_date(), start);
    }

    #[test]
    fn strategy_names_deserialize() {
        let parse = |name: &str| serde_yaml::from_str::<MonteCarloConfig>(&format!("calculated_strategy: {name}"));
        assert_eq!(parse("FIFO").unwrap().calculated_strategy, CalculatedMethod::FifoDateRange);
        assert_eq!(parse("lifo").unwrap().calculated_strategy, CalculatedMethod::LifoDateRange);
        assert_eq!(parse("all_in_window").unwrap().calculated_strategy, CalculatedMethod::AllInWindow);
        assert_eq!(
            parse("INVENTORY_WEIGHTED").unwrap().calculated_strategy,
            CalculatedMethod::InventoryWeighted
        );
        assert!(parse("RANDOM").is_err());
    }
}
