//! YAML configuration for the simulator and Monte Carlo runs
//!
//! Both sections are optional; anything left out takes its default.
//!
//! ```yaml
//! simulation:
//!   simulation_days: 30
//!   random_seed: 42
//!   network:
//!     num_farms: 5
//! monte_carlo:
//!   num_iterations: 200
//! ```

use crate::monte_carlo::MonteCarloConfig;
use crate::simulation::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub simulation: SimulationConfig,
    pub monte_carlo: MonteCarloConfig,
}

impl AppConfig {
    pub fn from_yaml(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.simulation.validate()?;
        self.monte_carlo.validate()
    }
}

/// Read and validate a YAML config file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<AppConfig> {
    let text = std::fs::read_to_string(path)?;
    AppConfig::from_yaml(&text)
}

/// Reject a probability outside `[0, 1]`
pub(crate) fn check_rate(field: &str, value: f64) -> ConfigResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{field} must be between 0.0 and 1.0, got {value}")))
    }
}

pub(crate) fn check_at_least_one(field: &str, value: usize) -> ConfigResult<()> {
    if value == 0 {
        Err(ConfigError::Invalid(format!("{field} must be at least 1")))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::CalculatedMethod;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(config.simulation.network.num_farms, 5);
        assert_eq!(config.monte_carlo.num_iterations, 1000);
    }

    #[test]
    fn load_config_reads_sections() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "simulation:\n  simulation_days: 21\n  random_seed: 7\n  network:\n    num_retailers: 8\nmonte_carlo:\n  num_iterations: 12\n  calculated_strategy: LIFO"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.simulation.simulation_days, 21);
        assert_eq!(config.simulation.random_seed, Some(7));
        assert_eq!(config.simulation.network.num_retailers, 8);
        assert_eq!(config.simulation.network.num_farms, 5);
        assert_eq!(config.monte_carlo.num_iterations, 12);
        assert_eq!(config.monte_carlo.calculated_strategy, CalculatedMethod::LifoDateRange);
    }

    #[test]
    fn out_of_range_rate_is_invalid() {
        let err = AppConfig::from_yaml("simulation:\n  contamination_rate: 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("contamination_rate")));
    }

    #[test]
    fn unknown_strategy_fails_to_parse() {
        let err = AppConfig::from_yaml("monte_carlo:\n  calculated_strategy: RANDOM").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = AppConfig::from_yaml("simulation: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config("/nonexistent/outbreak.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
