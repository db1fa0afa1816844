//! Scan budgets and budget profiles.
//!
//! A [`ScanBudget`] is built once per run from a [`BudgetProfile`] plus
//! [`BudgetOverrides`] and is never mutated afterwards. Derived budgets
//! (for example a per-route interaction cap) are new values.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};

/// Caller-selected scan depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetProfile {
    Quick,
    #[default]
    Standard,
    Thorough,
    Exhaustive,
}

impl BudgetProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Thorough => "thorough",
            Self::Exhaustive => "exhaustive",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quick" => Some(Self::Quick),
            "standard" => Some(Self::Standard),
            "thorough" => Some(Self::Thorough),
            "exhaustive" => Some(Self::Exhaustive),
            _ => None,
        }
    }

    /// The full preset for this profile.
    pub fn preset(&self) -> ScanBudget {
        let standard = ScanBudget::standard();
        match self {
            Self::Quick => ScanBudget {
                max_scan_duration_ms: 20_000,
                max_interactions_per_page: 10,
                max_pages: 5,
                max_unique_urls: 100,
                max_flows: 1,
                max_flow_steps: 3,
                settle_timeout_ms: 10_000,
                settle_idle_ms: 1_000,
                settle_dom_stable_ms: 1_000,
                max_retries_per_interaction: 1,
                ..standard
            },
            Self::Standard => standard,
            Self::Thorough => ScanBudget {
                max_scan_duration_ms: 300_000,
                max_interactions_per_page: 60,
                max_pages: 60,
                max_unique_urls: 1_500,
                max_flows: 6,
                max_flow_steps: 10,
                ..standard
            },
            Self::Exhaustive => ScanBudget {
                max_scan_duration_ms: 1_200_000,
                max_interactions_per_page: 100,
                max_pages: 200,
                max_unique_urls: 5_000,
                max_flows: 12,
                max_flow_steps: 20,
                interaction_timeout_ms: 15_000,
                navigation_timeout_ms: 30_000,
                ..standard
            },
        }
    }
}

impl std::fmt::Display for BudgetProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-run limits and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanBudget {
    pub max_scan_duration_ms: u64,
    pub max_interactions_per_page: u32,
    pub max_pages: u32,
    pub max_unique_urls: u32,
    pub max_flows: u32,
    pub max_flow_steps: u32,
    pub interaction_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    pub settle_timeout_ms: u64,
    pub settle_idle_ms: u64,
    pub settle_dom_stable_ms: u64,
    /// Delay after the action before the mid-window loading sample.
    pub stabilization_sample_mid_ms: u64,
    pub adaptive_stabilization: bool,
    /// How many times an idle window may extend when activity restarts.
    pub adaptive_extension_limit: u32,
    pub max_retries_per_interaction: u32,
}

impl ScanBudget {
    fn standard() -> Self {
        Self {
            max_scan_duration_ms: 60_000,
            max_interactions_per_page: 30,
            max_pages: 20,
            max_unique_urls: 500,
            max_flows: 3,
            max_flow_steps: 5,
            interaction_timeout_ms: 10_000,
            navigation_timeout_ms: 15_000,
            settle_timeout_ms: 30_000,
            settle_idle_ms: 1_500,
            settle_dom_stable_ms: 2_000,
            stabilization_sample_mid_ms: 500,
            adaptive_stabilization: false,
            adaptive_extension_limit: 2,
            max_retries_per_interaction: 2,
        }
    }

    /// Build the run budget from a profile and overrides, validating once.
    pub fn build(profile: BudgetProfile, overrides: &BudgetOverrides) -> DomainResult<Self> {
        let preset = profile.preset();
        let budget = Self {
            max_scan_duration_ms: overrides
                .max_scan_duration_ms
                .unwrap_or(preset.max_scan_duration_ms),
            max_interactions_per_page: overrides
                .max_interactions_per_page
                .unwrap_or(preset.max_interactions_per_page),
            max_pages: overrides.max_pages.unwrap_or(preset.max_pages),
            max_unique_urls: overrides.max_unique_urls.unwrap_or(preset.max_unique_urls),
            max_flows: overrides.max_flows.unwrap_or(preset.max_flows),
            max_flow_steps: overrides.max_flow_steps.unwrap_or(preset.max_flow_steps),
            interaction_timeout_ms: overrides
                .interaction_timeout_ms
                .unwrap_or(preset.interaction_timeout_ms),
            navigation_timeout_ms: overrides
                .navigation_timeout_ms
                .unwrap_or(preset.navigation_timeout_ms),
            settle_timeout_ms: overrides.settle_timeout_ms.unwrap_or(preset.settle_timeout_ms),
            settle_idle_ms: overrides.settle_idle_ms.unwrap_or(preset.settle_idle_ms),
            settle_dom_stable_ms: overrides
                .settle_dom_stable_ms
                .unwrap_or(preset.settle_dom_stable_ms),
            stabilization_sample_mid_ms: overrides
                .stabilization_sample_mid_ms
                .unwrap_or(preset.stabilization_sample_mid_ms),
            adaptive_stabilization: overrides
                .adaptive_stabilization
                .unwrap_or(preset.adaptive_stabilization),
            adaptive_extension_limit: overrides
                .adaptive_extension_limit
                .unwrap_or(preset.adaptive_extension_limit),
            max_retries_per_interaction: overrides
                .max_retries_per_interaction
                .unwrap_or(preset.max_retries_per_interaction),
        };
        budget.validate()?;
        Ok(budget)
    }

    fn validate(&self) -> DomainResult<()> {
        let non_zero = [
            ("max_scan_duration_ms", self.max_scan_duration_ms),
            ("interaction_timeout_ms", self.interaction_timeout_ms),
            ("navigation_timeout_ms", self.navigation_timeout_ms),
            ("settle_timeout_ms", self.settle_timeout_ms),
            ("max_pages", u64::from(self.max_pages)),
            ("max_unique_urls", u64::from(self.max_unique_urls)),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, v)| *v == 0) {
            return Err(DomainError::InvalidBudget(format!("{name} must be greater than 0")));
        }
        if self.settle_idle_ms > self.settle_timeout_ms {
            return Err(DomainError::InvalidBudget(format!(
                "settle_idle_ms ({}) exceeds settle_timeout_ms ({})",
                self.settle_idle_ms, self.settle_timeout_ms
            )));
        }
        if self.settle_dom_stable_ms > self.settle_timeout_ms {
            return Err(DomainError::InvalidBudget(format!(
                "settle_dom_stable_ms ({}) exceeds settle_timeout_ms ({})",
                self.settle_dom_stable_ms, self.settle_timeout_ms
            )));
        }
        Ok(())
    }

    /// A copy of this budget with a different per-page interaction cap.
    pub fn with_interaction_cap(&self, cap: u32) -> Self {
        Self {
            max_interactions_per_page: cap,
            ..self.clone()
        }
    }

    /// A copy with adaptive stabilization forced off, for reproducibility runs.
    pub fn deterministic(&self) -> Self {
        Self {
            adaptive_stabilization: false,
            ..self.clone()
        }
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn settle_idle(&self) -> Duration {
        Duration::from_millis(self.settle_idle_ms)
    }

    pub fn settle_dom_stable(&self) -> Duration {
        Duration::from_millis(self.settle_dom_stable_ms)
    }

    pub fn interaction_timeout(&self) -> Duration {
        Duration::from_millis(self.interaction_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn max_scan_duration(&self) -> Duration {
        Duration::from_millis(self.max_scan_duration_ms)
    }
}

impl Default for ScanBudget {
    fn default() -> Self {
        Self::standard()
    }
}

/// Optional per-field overrides applied on top of a profile preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scan_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_interactions_per_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unique_urls: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_flows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_flow_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_idle_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_dom_stable_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stabilization_sample_mid_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_stabilization: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_extension_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries_per_interaction: Option<u32>,
}

/// Interaction budget assigned to one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAllocation {
    pub route: String,
    pub budget: u32,
    pub is_critical: bool,
    pub reason: String,
}
