//! Command-line interface.

pub mod commands;
pub mod output;
pub mod table;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::errors::DomainError;
use crate::domain::models::ExitCode;
use crate::infrastructure::config::ConfigError;

use commands::budget::BudgetArgs;
use commands::classify::ClassifyArgs;
use commands::scan::ScanArgs;

#[derive(Parser, Debug)]
#[command(name = "tacit")]
#[command(about = "Tacit - evidence-gated silent-failure detection", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .tacit/config.yaml and .tacit/local.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl a site and verify declared expectations
    Scan(ScanArgs),
    /// Classify previously recorded observations
    Classify(ClassifyArgs),
    /// Show per-route interaction budgets
    Budget(BudgetArgs),
}

/// Exit code for an error that escaped a command.
///
/// Bad input (configuration, budgets, URLs, input documents) is a usage
/// error; everything else is internal.
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    for cause in err.chain() {
        if cause.downcast_ref::<ConfigError>().is_some() {
            return ExitCode::InvalidInput;
        }
        if let Some(domain) = cause.downcast_ref::<DomainError>() {
            return match domain {
                DomainError::Driver(_) => ExitCode::Internal,
                _ => ExitCode::InvalidInput,
            };
        }
    }
    ExitCode::Internal
}

/// Report an error on the right stream and return the process exit code.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) -> i32 {
    let code = exit_code_for(err);
    if json_mode {
        let body = serde_json::json!({
            "error": format!("{err:#}"),
            "exit_code": code.code(),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    code.code()
}
