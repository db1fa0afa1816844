//! `tacit scan`: crawl a site and verify expectations.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use super::{load_expectations_and_flows, resolve_budget};
use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::table::{list_table, render_list};
use crate::domain::models::{Config, Decision, RunSummary, RunTruth, ScanReport, Verdict};
use crate::domain::ports::PageDriver;
use crate::infrastructure::artifacts::{ArtifactWriter, RunMeta};
use crate::infrastructure::browser::{ScriptedPageDriver, SiteModel};
use crate::services::ScanOrchestrator;

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Start URL; must be http or https
    #[arg(short, long)]
    pub url: String,

    /// Site model replayed by the scripted driver (YAML or JSON)
    #[arg(long)]
    pub site_model: PathBuf,

    /// Expectations document (YAML or JSON)
    #[arg(short, long)]
    pub expectations: Option<PathBuf>,

    /// Budget profile: quick, standard, thorough, exhaustive
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Artifact directory (overrides output.dir)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Skip writing run artifacts
    #[arg(long)]
    pub no_artifacts: bool,

    /// Force fixed stabilization windows for reproducible runs
    #[arg(long)]
    pub deterministic: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct ScanOutput {
    pub start_url: String,
    pub pages_visited: u32,
    pub decision: Decision,
    pub truth: RunTruth,
    pub summary: RunSummary,
    pub verdicts: Vec<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts_dir: Option<PathBuf>,
}

impl ScanOutput {
    fn new(report: ScanReport, artifacts_dir: Option<PathBuf>) -> Self {
        Self {
            start_url: report.start_url,
            pages_visited: report.frontier.pages_visited,
            decision: report.decision,
            truth: report.truth,
            summary: report.summary,
            verdicts: report.verdicts,
            artifacts_dir,
        }
    }
}

impl CommandOutput for ScanOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Scan of {}", self.start_url),
            format!(
                "Pages visited: {}   Expectations: {}   Attempted: {}   Coverage: {:.0}%",
                self.pages_visited,
                self.summary.expectations_total,
                self.summary.attempted,
                self.summary.coverage_ratio * 100.0
            ),
            String::new(),
        ];

        let mut table = list_table(&["expectation", "status", "class", "confidence", "reason"]);
        for verdict in &self.verdicts {
            table.add_row(vec![
                verdict.expectation_id.clone().unwrap_or_default(),
                verdict.status.as_str().to_string(),
                verdict
                    .failure_class
                    .map(|c| c.as_str().to_string())
                    .unwrap_or_default(),
                format!("{:.2}", verdict.confidence),
                truncate(&verdict.reason, 60),
            ]);
        }
        lines.push(render_list("verdict", &table, self.verdicts.len()));
        lines.push(String::new());
        lines.extend(truth_lines(&self.truth));
        lines.push(format!(
            "Decision: {} (exit {})",
            self.decision.verdict.label(),
            self.decision.exit_code
        ));
        if let Some(dir) = &self.artifacts_dir {
            lines.push(format!("Artifacts: {}", dir.display()));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Truth state, explanation, safety statement and top reasons.
pub fn truth_lines(truth: &RunTruth) -> Vec<String> {
    let mut lines = vec![format!(
        "Truth: {} ({} confidence) - {}",
        truth.truth_state.as_str(),
        truth.confidence.as_str(),
        truth.explanation
    )];
    if let Some(statement) = &truth.safety_statement {
        lines.push(statement.clone());
    }
    for reason in &truth.top_reasons {
        lines.push(format!("  {:<28} {}", reason.key, reason.count));
    }
    lines
}

/// Run the scan and return the decision's exit code.
pub async fn execute(args: ScanArgs, config: Config, json_mode: bool) -> Result<i32> {
    let (profile, budget) = resolve_budget(args.profile.as_deref(), &config)?;
    let budget = if args.deterministic {
        budget.deterministic()
    } else {
        budget
    };

    let site = SiteModel::from_path(&args.site_model)
        .with_context(|| format!("failed to load site model {}", args.site_model.display()))?;
    let (expectations, flows) = match &args.expectations {
        Some(path) => load_expectations_and_flows(path)?,
        None => (Vec::new(), Vec::new()),
    };

    let page: Arc<dyn PageDriver> = Arc::new(ScriptedPageDriver::new(site));
    let driver_name = page.name();
    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.dir));

    let meta = RunMeta::new(profile, driver_name, Utc::now());
    let orchestrator = ScanOrchestrator::new(page, budget, config);
    let report = orchestrator
        .run_with_flows(&args.url, &expectations, &flows)
        .await?;
    let meta = meta.finish(Utc::now());

    let artifacts_dir = if args.no_artifacts {
        None
    } else {
        let written = ArtifactWriter::new(out_dir).write(&report, &meta).await?;
        Some(written.dir)
    };

    let exit_code = report.decision.exit_code;
    output(&ScanOutput::new(report, artifacts_dir), json_mode);
    Ok(exit_code)
}
