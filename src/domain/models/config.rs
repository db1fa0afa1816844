use serde::{Deserialize, Serialize};

use super::budget::{BudgetOverrides, BudgetProfile};
use super::decision::DecisionPolicy;
use super::truth::TruthThresholds;

/// Main configuration structure for Tacit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Scan depth profile: quick, standard, thorough, exhaustive
    #[serde(default)]
    pub profile: BudgetProfile,

    /// Per-field overrides applied on top of the profile preset
    #[serde(default)]
    pub budget: BudgetOverrides,

    /// Per-route interaction allocation
    #[serde(default)]
    pub allocation: AllocationConfig,

    /// Crawl frontier configuration
    #[serde(default)]
    pub frontier: FrontierConfig,

    /// Run truth thresholds
    #[serde(default)]
    pub truth: TruthThresholds,

    /// Decision authority policy
    #[serde(default)]
    pub policy: DecisionPolicy,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Artifact output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Budget engine multipliers and clamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AllocationConfig {
    /// Base interactions per route; the profile's per-page cap when unset
    #[serde(default)]
    pub base_budget: Option<u32>,

    /// Multiplier for routes with at least one declared expectation
    #[serde(default = "default_critical_multiplier")]
    pub critical_multiplier: f64,

    /// Extra multiplier for critical routes with more than three expectations
    #[serde(default = "default_expectation_multiplier")]
    pub expectation_multiplier: f64,

    /// Multiplier for non-critical routes in projects above `many_routes_threshold`
    #[serde(default = "default_non_critical_multiplier")]
    pub non_critical_multiplier: f64,

    /// Route count above which non-critical routes are scaled down
    #[serde(default = "default_many_routes_threshold")]
    pub many_routes_threshold: usize,

    /// Route count above which every budget is scaled down
    #[serde(default = "default_large_project_threshold")]
    pub large_project_threshold: usize,

    /// Lower bound of the large-project scale factor
    #[serde(default = "default_large_project_floor")]
    pub large_project_floor: f64,

    #[serde(default = "default_min_budget")]
    pub min_budget: u32,

    #[serde(default = "default_max_budget")]
    pub max_budget: u32,
}

const fn default_critical_multiplier() -> f64 {
    2.0
}

const fn default_expectation_multiplier() -> f64 {
    1.5
}

const fn default_non_critical_multiplier() -> f64 {
    0.6
}

const fn default_many_routes_threshold() -> usize {
    10
}

const fn default_large_project_threshold() -> usize {
    50
}

const fn default_large_project_floor() -> f64 {
    0.6
}

const fn default_min_budget() -> u32 {
    5
}

const fn default_max_budget() -> u32 {
    100
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            base_budget: None,
            critical_multiplier: default_critical_multiplier(),
            expectation_multiplier: default_expectation_multiplier(),
            non_critical_multiplier: default_non_critical_multiplier(),
            many_routes_threshold: default_many_routes_threshold(),
            large_project_threshold: default_large_project_threshold(),
            large_project_floor: default_large_project_floor(),
            min_budget: default_min_budget(),
            max_budget: default_max_budget(),
        }
    }
}

/// Crawl frontier configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FrontierConfig {
    /// Query parameters dropped during canonicalization, beyond the built-in list
    #[serde(default)]
    pub extra_tracking_params: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            retention_days: default_retention_days(),
        }
    }
}

/// Artifact output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OutputConfig {
    /// Directory that receives one subdirectory per run
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

fn default_output_dir() -> String {
    ".tacit/runs".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}
