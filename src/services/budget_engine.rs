//! Per-route interaction budget allocation.
//!
//! Routes with declared expectations are critical and get more interactions.
//! Non-critical routes in larger projects get fewer, and very large projects
//! are scaled down as a whole. The result is always clamped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::models::{AllocationConfig, Expectation, RouteAllocation, ScanBudget};

/// One route and the expectations declared against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub url: String,
    #[serde(default)]
    pub expectations: Vec<Expectation>,
}

impl RouteSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expectations: Vec::new(),
        }
    }

    pub fn with_expectation(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }
}

/// Deterministic budget allocator.
///
/// A pure function of its inputs: no clock, no randomness, and output order
/// independent of input order.
#[derive(Debug, Clone)]
pub struct BudgetEngine {
    config: AllocationConfig,
    base: u32,
}

impl BudgetEngine {
    /// The base budget is the configured one, else the scan budget's
    /// per-page interaction cap.
    pub fn new(config: &AllocationConfig, budget: &ScanBudget) -> Self {
        Self {
            base: config.base_budget.unwrap_or(budget.max_interactions_per_page),
            config: config.clone(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Allocate the interaction budget for one route.
    pub fn allocate(
        &self,
        route: &str,
        expectations: &[Expectation],
        total_routes: usize,
    ) -> RouteAllocation {
        let cfg = &self.config;
        let count = expectations.len();
        let is_critical = count > 0;
        let mut value = f64::from(self.base);
        let mut reasons = Vec::new();

        if is_critical {
            value *= cfg.critical_multiplier;
            reasons.push(format!(
                "critical ({count} expectation{}) x{}",
                if count == 1 { "" } else { "s" },
                cfg.critical_multiplier
            ));
            if count > 3 {
                value *= cfg.expectation_multiplier;
                reasons.push(format!("expectation-dense x{}", cfg.expectation_multiplier));
            }
        } else if total_routes > cfg.many_routes_threshold {
            value *= cfg.non_critical_multiplier;
            reasons.push(format!(
                "non-critical in {total_routes} routes x{}",
                cfg.non_critical_multiplier
            ));
        }

        if total_routes > cfg.large_project_threshold {
            let scale =
                (cfg.large_project_threshold as f64 / total_routes as f64).max(cfg.large_project_floor);
            value *= scale;
            reasons.push(format!("large project x{:.2}", scale));
        }

        // f64::round rounds half away from zero.
        let rounded = value.round().max(0.0) as u32;
        let budget = rounded.clamp(cfg.min_budget, cfg.max_budget);
        if budget != rounded {
            reasons.push(format!("clamped to [{}, {}]", cfg.min_budget, cfg.max_budget));
        }
        if reasons.is_empty() {
            reasons.push("base".to_string());
        }

        debug!(route, budget, is_critical, "allocated route budget");

        RouteAllocation {
            route: route.to_string(),
            budget,
            is_critical,
            reason: reasons.join("; "),
        }
    }

    /// Allocate every route, sorted by URL ascending.
    pub fn allocate_all(&self, routes: &[RouteSpec]) -> Vec<RouteAllocation> {
        let total = routes.len();
        let mut allocations: Vec<RouteAllocation> = routes
            .iter()
            .map(|r| self.allocate(&r.url, &r.expectations, total))
            .collect();
        allocations.sort_by(|a, b| a.route.cmp(&b.route));
        allocations
    }
}
