//! Tacit - evidence-gated silent-failure detection
//!
//! Tacit drives the interactions a web application promises (navigation,
//! form submission, state changes, feedback, loading transitions,
//! permission checks) and flags the ones that appear to succeed but leave no
//! observable trace. Every verdict is a rule-deterministic function of
//! recorded evidence.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and the browser driver port
//! - **Service Layer** (`services`): stabilization, budgets, crawl frontier,
//!   interaction driver, classifiers and the scan orchestrator
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging,
//!   the scripted driver and artifact output
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tacit::infrastructure::browser::{ScriptedPageDriver, SiteModel};
//! use tacit::{BudgetProfile, Config, ScanBudget, ScanOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let site = SiteModel::from_path("site.yaml")?;
//!     let budget = ScanBudget::build(BudgetProfile::Quick, &Default::default())?;
//!     let scan = ScanOrchestrator::new(Arc::new(ScriptedPageDriver::new(site)), budget, Config::default());
//!     let report = scan.run("https://shop.test/", &[]).await?;
//!     println!("{}", report.decision.verdict);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult, DriverError};
pub use domain::models::{
    BudgetProfile, Config, Decision, Expectation, FinalVerdict, Observation, RunSummary,
    RunTruth, ScanBudget, ScanReport, TruthState, Verdict, VerdictStatus,
};
pub use domain::ports::PageDriver;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{DecisionAuthority, ScanOrchestrator};
