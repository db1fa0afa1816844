//! Per-interaction trace records and the run report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::decision::Decision;
use super::interaction::InteractionDescriptor;
use super::observation::{EvidenceSignals, Observation, PageState};
use super::page::SettleOutcome;
use super::truth::{RunSummary, RunTruth};
use super::verdict::Verdict;

/// Why the safety gate withheld an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Destructive,
    SensitiveClear,
    Financial,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Destructive => "destructive_action",
            Self::SensitiveClear => "sensitive_clear",
            Self::Financial => "financial_action",
        }
    }
}

/// Result of the destructive-action safety gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipDecision {
    pub skip: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    /// The keyword that triggered the skip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
}

impl SkipDecision {
    pub fn allow() -> Self {
        Self {
            skip: false,
            reason: None,
            matched: None,
        }
    }

    pub fn block(reason: SkipReason, matched: impl Into<String>) -> Self {
        Self {
            skip: true,
            reason: Some(reason),
            matched: Some(matched.into()),
        }
    }
}

/// A per-interaction failure converted into a record instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub finding_type: String,
    pub message: String,
}

/// Factors that can make two runs over the same site diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeterminismFactor {
    TimeoutRisk,
    AdaptiveStabilization,
    FrontierCapped,
    ScanTimeExhausted,
    RetryUsed,
}

impl DeterminismFactor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeoutRisk => "TIMEOUT_RISK",
            Self::AdaptiveStabilization => "ADAPTIVE_STABILIZATION",
            Self::FrontierCapped => "FRONTIER_CAPPED",
            Self::ScanTimeExhausted => "SCAN_TIME_EXHAUSTED",
            Self::RetryUsed => "RETRY_USED",
        }
    }
}

/// One record per interaction in the traces artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    pub sequence: u32,
    pub page_url: String,
    /// `<flow id>#<step number>` for steps run as part of a flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_step: Option<String>,
    pub interaction: InteractionDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<PageState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<PageState>,
    #[serde(default)]
    pub evidence_signals: EvidenceSignals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle: Option<SettleOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StepFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

/// Frontier counters at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontierStats {
    pub pages_visited: u32,
    pub pages_discovered: u32,
    pub frontier_capped: bool,
    pub time_exhausted: bool,
    pub visited: Vec<String>,
}

/// Everything one scan produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub start_url: String,
    pub frontier: FrontierStats,
    pub traces: Vec<TraceRecord>,
    pub observations: Vec<Observation>,
    pub verdicts: Vec<Verdict>,
    pub summary: RunSummary,
    pub truth: RunTruth,
    pub decision: Decision,
    /// Factor name to occurrence count.
    pub determinism_factors: BTreeMap<DeterminismFactor, u32>,
}
