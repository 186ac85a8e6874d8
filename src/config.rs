//! Service configuration.
//!
//! Environment variables are the only configuration source; every option has
//! a default. A malformed value fails fast at startup rather than surfacing
//! mid-run.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::engine::{FitnessWeights, GaParams};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Constraint(&'static str),
}

/// Runtime configuration for the assignment service.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path.
    pub db_path: PathBuf,
    /// HTTP listen address.
    pub bind: SocketAddr,
    /// Change-cursor poll interval for the trigger loop's fallback path.
    pub poll_interval: Duration,
    /// Genetic optimizer parameters.
    pub ga: GaParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("smartwaste.db"),
            bind: SocketAddr::from(([0, 0, 0, 0], 5001)),
            poll_interval: Duration::from_millis(2000),
            ga: GaParams::default(),
        }
    }
}

impl Config {
    /// Build the configuration from environment variables.
    ///
    /// Recognized variables:
    /// - `SMARTWASTE_DB_PATH` - SQLite database path
    /// - `SMARTWASTE_BIND` - listen address, e.g. `0.0.0.0:5001`
    /// - `SMARTWASTE_POLL_INTERVAL_MS` - insert-poll interval
    /// - `SMARTWASTE_POPULATION_SIZE`, `SMARTWASTE_MAX_GENERATIONS`,
    ///   `SMARTWASTE_MAX_WALL_CLOCK_MS`, `SMARTWASTE_MUTATION_RATE`,
    ///   `SMARTWASTE_TOURNAMENT_SIZE`, `SMARTWASTE_STAGNATION_LIMIT`,
    ///   `SMARTWASTE_GA_SEED` - optimizer budgets
    /// - `SMARTWASTE_W_PRIORITY`, `SMARTWASTE_W_COST`, `SMARTWASTE_W_BALANCE`,
    ///   `SMARTWASTE_PENALTY_CONFLICT` - objective weights
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let ga_defaults = defaults.ga;

        let config = Self {
            db_path: PathBuf::from(
                std::env::var("SMARTWASTE_DB_PATH")
                    .unwrap_or_else(|_| "smartwaste.db".to_string()),
            ),
            bind: env_parse("SMARTWASTE_BIND", defaults.bind)?,
            poll_interval: Duration::from_millis(env_parse(
                "SMARTWASTE_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )?),
            ga: GaParams {
                population_size: env_parse(
                    "SMARTWASTE_POPULATION_SIZE",
                    ga_defaults.population_size,
                )?,
                max_generations: env_parse(
                    "SMARTWASTE_MAX_GENERATIONS",
                    ga_defaults.max_generations,
                )?,
                max_wall_clock: Duration::from_millis(env_parse(
                    "SMARTWASTE_MAX_WALL_CLOCK_MS",
                    ga_defaults.max_wall_clock.as_millis() as u64,
                )?),
                mutation_rate: env_parse("SMARTWASTE_MUTATION_RATE", ga_defaults.mutation_rate)?,
                tournament_size: env_parse(
                    "SMARTWASTE_TOURNAMENT_SIZE",
                    ga_defaults.tournament_size,
                )?,
                stagnation_limit: env_parse(
                    "SMARTWASTE_STAGNATION_LIMIT",
                    ga_defaults.stagnation_limit,
                )?,
                seed: env_parse_opt("SMARTWASTE_GA_SEED")?,
                weights: FitnessWeights {
                    w_priority: env_parse(
                        "SMARTWASTE_W_PRIORITY",
                        ga_defaults.weights.w_priority,
                    )?,
                    w_cost: env_parse("SMARTWASTE_W_COST", ga_defaults.weights.w_cost)?,
                    w_balance: env_parse("SMARTWASTE_W_BALANCE", ga_defaults.weights.w_balance)?,
                    penalty_conflict: env_parse(
                        "SMARTWASTE_PENALTY_CONFLICT",
                        ga_defaults.weights.penalty_conflict,
                    )?,
                },
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ga.population_size == 0 {
            return Err(ConfigError::Constraint("population size must be at least 1"));
        }
        if self.ga.max_generations == 0 {
            return Err(ConfigError::Constraint("max generations must be at least 1"));
        }
        if self.ga.tournament_size == 0 {
            return Err(ConfigError::Constraint("tournament size must be at least 1"));
        }
        if self.ga.tournament_size > self.ga.population_size {
            return Err(ConfigError::Constraint(
                "tournament size cannot exceed population size",
            ));
        }
        if !(0.0..=1.0).contains(&self.ga.mutation_rate) {
            return Err(ConfigError::Constraint(
                "mutation rate must be between 0 and 1",
            ));
        }
        if self.ga.weights.penalty_conflict <= 0.0 {
            return Err(ConfigError::Constraint("conflict penalty must be positive"));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

fn env_parse_opt<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_population_rejected() {
        let mut config = Config::default();
        config.ga.population_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tournament_larger_than_population_rejected() {
        let mut config = Config::default();
        config.ga.population_size = 2;
        config.ga.tournament_size = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mutation_rate_bounds() {
        let mut config = Config::default();
        config.ga.mutation_rate = 1.5;
        assert!(config.validate().is_err());
        config.ga.mutation_rate = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_conflict_penalty_rejected() {
        let mut config = Config::default();
        config.ga.weights.penalty_conflict = 0.0;
        assert!(config.validate().is_err());
    }
}
