//! CLI command implementations.

pub mod budget;
pub mod classify;
pub mod scan;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::domain::errors::DomainError;
use crate::domain::models::{BudgetProfile, Config, Expectation, ExpectationInput, Flow, ScanBudget};

/// Read a YAML document, or JSON when the extension is `.json`.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(DomainError::from)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&raw).map_err(DomainError::from)
    } else {
        serde_yaml::from_str(&raw).map_err(DomainError::from)
    };
    parsed.with_context(|| format!("failed to parse {}", path.display()))
}

fn load_input(path: &Path) -> Result<ExpectationInput> {
    let input: ExpectationInput = read_document(path)?;
    input
        .validate()
        .with_context(|| format!("invalid expectations in {}", path.display()))?;
    Ok(input)
}

/// Load, validate and resolve an expectations document.
pub fn load_expectations(path: &Path) -> Result<Vec<Expectation>> {
    Ok(load_input(path)?.resolved())
}

/// Resolved expectations plus the flows declared alongside them.
pub fn load_expectations_and_flows(path: &Path) -> Result<(Vec<Expectation>, Vec<Flow>)> {
    let input = load_input(path)?;
    let expectations = input.resolved();
    Ok((expectations, input.flows))
}

/// The run budget: the CLI profile flag wins over the configured profile.
pub fn resolve_budget(profile: Option<&str>, config: &Config) -> Result<(BudgetProfile, ScanBudget)> {
    let profile = match profile {
        Some(name) => BudgetProfile::from_str(name)
            .ok_or_else(|| DomainError::UnknownProfile(name.to_string()))?,
        None => config.profile,
    };
    let budget = ScanBudget::build(profile, &config.budget)?;
    Ok((profile, budget))
}
