//! Tacit CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing::warn;

use tacit::cli::{commands, handle_error, Cli, Commands};
use tacit::infrastructure::config::ConfigLoader;
use tacit::infrastructure::logging::{prune_old_logs, LogConfig, LoggerImpl};
use tacit::Config;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    // The logger guard lives inside `run` so file output is flushed before exit.
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => handle_error(&err, json_mode),
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let mut log_config = LogConfig::from(&config.logging);
    if let Some(level) = &cli.log_level {
        log_config.level.clone_from(level);
    }
    let _logger = LoggerImpl::init(&log_config)?;
    if let Some(dir) = &log_config.log_dir {
        if let Err(err) = prune_old_logs(dir, log_config.retention_days, chrono::Utc::now()).await {
            warn!(error = %err, "failed to prune old log files");
        }
    }

    dispatch(cli.command, config, cli.json).await
}

async fn dispatch(command: Commands, config: Config, json_mode: bool) -> Result<i32> {
    match command {
        Commands::Scan(args) => commands::scan::execute(args, config, json_mode).await,
        Commands::Classify(args) => commands::classify::execute(args, &config, json_mode),
        Commands::Budget(args) => commands::budget::execute(args, &config, json_mode),
    }
}
