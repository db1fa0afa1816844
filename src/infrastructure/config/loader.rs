use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::ScanBudget;
use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid min_coverage: {0}. Must be between 0.0 and 1.0")]
    InvalidCoverage(f64),

    #[error("Invalid multiplier {name}: {value}. Must be positive")]
    InvalidMultiplier { name: &'static str, value: f64 },

    #[error("Invalid budget clamp: min_budget ({0}) must not exceed max_budget ({1})")]
    InvalidClamp(u32, u32),

    #[error("Invalid budget: {0}")]
    InvalidBudget(String),

    #[error("Output directory cannot be empty")]
    EmptyOutputDir,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .tacit/config.yaml (project config)
    /// 3. .tacit/local.yaml (local overrides, optional)
    /// 4. Environment variables (TACIT_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".tacit/config.yaml"))
            .merge(Yaml::file(".tacit/local.yaml"))
            .merge(Env::prefixed("TACIT_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("TACIT_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let coverage = config.truth.min_coverage;
        if !(0.0..=1.0).contains(&coverage) {
            return Err(ConfigError::InvalidCoverage(coverage));
        }

        let allocation = &config.allocation;
        for (name, value) in [
            ("critical_multiplier", allocation.critical_multiplier),
            ("expectation_multiplier", allocation.expectation_multiplier),
            ("non_critical_multiplier", allocation.non_critical_multiplier),
            ("large_project_floor", allocation.large_project_floor),
        ] {
            if value <= 0.0 || !value.is_finite() {
                return Err(ConfigError::InvalidMultiplier { name, value });
            }
        }

        if allocation.min_budget > allocation.max_budget {
            return Err(ConfigError::InvalidClamp(
                allocation.min_budget,
                allocation.max_budget,
            ));
        }

        if allocation.base_budget == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "allocation.base_budget must be at least 1".to_string(),
            ));
        }

        if config.output.dir.trim().is_empty() {
            return Err(ConfigError::EmptyOutputDir);
        }

        ScanBudget::build(config.profile, &config.budget)
            .map_err(|e| ConfigError::InvalidBudget(e.to_string()))?;

        Ok(())
    }
}
