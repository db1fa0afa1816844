//! Run-level truth: the terminal aggregate of one scan.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Literal statement carried by every `INCOMPLETE` result.
pub const INCOMPLETE_SAFETY_STATEMENT: &str =
    "INCOMPLETE: this result must not be treated as safe. Unverified interactions may still fail silently.";

/// The three unambiguous run states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TruthState {
    Success,
    Findings,
    Incomplete,
}

impl TruthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Findings => "FINDINGS",
            Self::Incomplete => "INCOMPLETE",
        }
    }
}

impl std::fmt::Display for TruthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse confidence attached to the run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TruthConfidence {
    Low,
    Medium,
    High,
}

impl TruthConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

/// Kinds of ambiguity that block a confident SUCCESS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalSilenceKind {
    AmbiguousIntent,
    AmbiguousNavigation,
    AmbiguousSubmission,
}

impl CriticalSilenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AmbiguousIntent => "ambiguous_intent",
            Self::AmbiguousNavigation => "ambiguous_navigation",
            Self::AmbiguousSubmission => "ambiguous_submission",
        }
    }
}

/// Thresholds for the truth classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TruthThresholds {
    /// Minimum attempted/expected ratio for SUCCESS.
    #[serde(default = "default_min_coverage")]
    pub min_coverage: f64,
}

const fn default_min_coverage() -> f64 {
    0.90
}

impl Default for TruthThresholds {
    fn default() -> Self {
        Self {
            min_coverage: default_min_coverage(),
        }
    }
}

/// Aggregate counts fed to the truth classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub expectations_total: u32,
    pub attempted: u32,
    pub observed: u32,
    pub silent_failures: u32,
    pub suspected: u32,
    pub coverage_ratio: f64,
    pub is_incomplete: bool,
    pub infrastructure_failure: bool,
    #[serde(default)]
    pub critical_silences: BTreeMap<CriticalSilenceKind, u32>,
    #[serde(default)]
    pub unattempted_breakdown: BTreeMap<String, u32>,
    /// Reasons the run is incomplete (budget caps, time, timeouts), by count.
    #[serde(default)]
    pub incomplete_reasons: BTreeMap<String, u32>,
}

impl RunSummary {
    pub fn critical_silence_total(&self) -> u32 {
        self.critical_silences.values().sum()
    }

    /// Unrounded attempted / total. `coverage_ratio` is the rounded form
    /// kept for reports; thresholds compare against this one.
    pub fn exact_coverage(&self) -> f64 {
        if self.expectations_total == 0 {
            1.0
        } else {
            f64::from(self.attempted) / f64::from(self.expectations_total)
        }
    }
}

/// Coverage block surfaced with every run truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    pub expectations_total: u32,
    pub attempted: u32,
    pub observed: u32,
    pub coverage_ratio: f64,
    pub unattempted_breakdown: BTreeMap<String, u32>,
}

/// One entry in the deterministic top-reasons breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCount {
    pub key: String,
    pub count: u32,
}

/// Terminal run verdict; created once at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTruth {
    pub truth_state: TruthState,
    pub confidence: TruthConfidence,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_statement: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_reasons: Vec<ReasonCount>,
    pub coverage_summary: CoverageSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_silence_total() {
        let mut summary = RunSummary::default();
        summary
            .critical_silences
            .insert(CriticalSilenceKind::AmbiguousIntent, 2);
        summary
            .critical_silences
            .insert(CriticalSilenceKind::AmbiguousSubmission, 1);
        assert_eq!(summary.critical_silence_total(), 3);
    }

    #[test]
    fn test_truth_state_wire_format() {
        assert_eq!(
            serde_json::to_string(&TruthState::Incomplete).unwrap(),
            "\"INCOMPLETE\""
        );
        assert!(TruthConfidence::High > TruthConfidence::Low);
    }
}
