//! Run artifact writer.
//!
//! Each run gets `<out_dir>/<run_id>/` holding:
//! - `traces.jsonl`: one trace record per interaction
//! - `summary.json`: verdicts, summary, truth and decision, without timestamps
//! - `run.meta.json`: run id, timestamps and the budget profile
//!
//! Only `run.meta.json` varies between two runs over the same site state.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::domain::models::{
    BudgetProfile, Decision, DeterminismFactor, FrontierStats, RunSummary, RunTruth, ScanReport,
    Verdict,
};

pub const TRACES_FILE: &str = "traces.jsonl";
pub const SUMMARY_FILE: &str = "summary.json";
pub const META_FILE: &str = "run.meta.json";

/// Non-deterministic run metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMeta {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub profile: BudgetProfile,
    pub driver: String,
    pub tool_version: String,
}

impl RunMeta {
    pub fn new(profile: BudgetProfile, driver: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: started_at,
            profile,
            driver: driver.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn finish(mut self, finished_at: DateTime<Utc>) -> Self {
        self.finished_at = finished_at;
        self
    }
}

/// The deterministic part of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummaryArtifact {
    pub start_url: String,
    pub frontier: FrontierStats,
    pub summary: RunSummary,
    pub truth: RunTruth,
    pub decision: Decision,
    pub verdicts: Vec<Verdict>,
    pub determinism_factors: BTreeMap<DeterminismFactor, u32>,
}

impl From<&ScanReport> for RunSummaryArtifact {
    fn from(report: &ScanReport) -> Self {
        Self {
            start_url: report.start_url.clone(),
            frontier: report.frontier.clone(),
            summary: report.summary.clone(),
            truth: report.truth.clone(),
            decision: report.decision.clone(),
            verdicts: report.verdicts.clone(),
            determinism_factors: report.determinism_factors.clone(),
        }
    }
}

/// Paths of the files written for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunArtifacts {
    pub dir: PathBuf,
    pub traces: PathBuf,
    pub summary: PathBuf,
    pub meta: PathBuf,
}

pub struct ArtifactWriter {
    out_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub async fn write(&self, report: &ScanReport, meta: &RunMeta) -> Result<RunArtifacts> {
        let dir = self.out_dir.join(meta.run_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create run directory {}", dir.display()))?;

        let mut traces = String::new();
        for record in &report.traces {
            traces.push_str(&serde_json::to_string(record).context("failed to serialize trace")?);
            traces.push('\n');
        }

        let summary = serde_json::to_string_pretty(&RunSummaryArtifact::from(report))
            .context("failed to serialize summary")?;
        let meta_json = serde_json::to_string_pretty(meta).context("failed to serialize run meta")?;

        let artifacts = RunArtifacts {
            traces: dir.join(TRACES_FILE),
            summary: dir.join(SUMMARY_FILE),
            meta: dir.join(META_FILE),
            dir,
        };

        try_join_all(
            [
                (&artifacts.traces, traces),
                (&artifacts.summary, summary),
                (&artifacts.meta, meta_json),
            ]
            .map(|(path, contents)| async move {
                tokio::fs::write(path, contents)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))
            }),
        )
        .await?;

        info!(
            run_id = %meta.run_id,
            dir = %artifacts.dir.display(),
            traces = report.traces.len(),
            "wrote run artifacts"
        );
        Ok(artifacts)
    }
}
