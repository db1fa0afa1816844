//! `tacit budget`: show how interactions would be allocated per route.

use anyhow::Result;
use clap::Args;
use serde::Deserialize;
use std::path::PathBuf;

use super::{load_expectations, read_document, resolve_budget};
use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::table::{list_table, render_list};
use crate::domain::models::{Config, Expectation, RouteAllocation, ScanBudget};
use crate::services::{BudgetEngine, RouteSpec};

#[derive(Args, Debug)]
pub struct BudgetArgs {
    /// Routes document: `routes: [{url, expectations}]`
    #[arg(short, long)]
    pub routes: PathBuf,

    /// Expectations document; each expectation is added to its `route`
    #[arg(short, long)]
    pub expectations: Option<PathBuf>,

    /// Budget profile: quick, standard, thorough, exhaustive
    #[arg(short, long)]
    pub profile: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RoutesInput {
    #[serde(default)]
    routes: Vec<RouteSpec>,
}

#[derive(Debug, serde::Serialize)]
pub struct BudgetOutput {
    pub profile: String,
    pub base_budget: u32,
    pub budget: ScanBudget,
    pub allocations: Vec<RouteAllocation>,
}

impl CommandOutput for BudgetOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["route", "budget", "critical", "reason"]);
        for allocation in &self.allocations {
            table.add_row(vec![
                truncate(&allocation.route, 50),
                allocation.budget.to_string(),
                if allocation.is_critical { "yes" } else { "no" }.to_string(),
                allocation.reason.clone(),
            ]);
        }
        format!(
            "Profile: {} (base {} interactions/route, {} pages, {}s)\n{}",
            self.profile,
            self.base_budget,
            self.budget.max_pages,
            self.budget.max_scan_duration_ms / 1000,
            render_list("route", &table, self.allocations.len())
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Attach each routed expectation to its route, adding routes as needed.
pub fn merge_expectations(mut routes: Vec<RouteSpec>, expectations: Vec<Expectation>) -> Vec<RouteSpec> {
    for expectation in expectations {
        let Some(route) = expectation.route.clone() else {
            continue;
        };
        match routes.iter_mut().find(|r| r.url == route) {
            Some(spec) => spec.expectations.push(expectation),
            None => routes.push(RouteSpec::new(route).with_expectation(expectation)),
        }
    }
    routes
}

pub fn execute(args: BudgetArgs, config: &Config, json_mode: bool) -> Result<i32> {
    let (profile, budget) = resolve_budget(args.profile.as_deref(), config)?;
    let input: RoutesInput = read_document(&args.routes)?;
    let routes = match &args.expectations {
        Some(path) => merge_expectations(input.routes, load_expectations(path)?),
        None => input.routes,
    };

    let engine = BudgetEngine::new(&config.allocation, &budget);
    output(
        &BudgetOutput {
            profile: profile.as_str().to_string(),
            base_budget: engine.base(),
            allocations: engine.allocate_all(&routes),
            budget,
        },
        json_mode,
    );
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::BudgetProfile;

    #[test]
    fn test_merge_expectations_groups_by_route() {
        let routes = vec![RouteSpec::new("/checkout")];
        let expectations = vec![
            Expectation::new("a", "submit").with_route("/checkout"),
            Expectation::new("b", "navigation").with_route("/home"),
            Expectation::new("c", "feedback"),
        ];

        let merged = merge_expectations(routes, expectations);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].expectations.len(), 1);
        assert_eq!(merged[1].url, "/home");
    }

    #[test]
    fn test_budget_output_human_lists_routes() {
        let budget = BudgetProfile::Standard.preset();
        let engine = BudgetEngine::new(&Config::default().allocation, &budget);
        let routes = vec![
            RouteSpec::new("/b"),
            RouteSpec::new("/a").with_expectation(Expectation::new("x", "submit")),
        ];
        let out = BudgetOutput {
            profile: "standard".to_string(),
            base_budget: engine.base(),
            allocations: engine.allocate_all(&routes),
            budget,
        };

        let human = out.to_human();
        assert!(human.contains("2 routes:"));
        assert!(human.find("/a").unwrap() < human.find("/b").unwrap());
    }
}
