//! Verdicts produced by the silent-failure classifier.

use serde::{Deserialize, Serialize};

use super::expectation::PromiseKind;

/// Verdict status. Only `Confirmed` counts as a silent failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    Confirmed,
    Suspected,
    Observed,
    CoverageGap,
    Unproven,
    Unclassifiable,
}

impl VerdictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "CONFIRMED",
            Self::Suspected => "SUSPECTED",
            Self::Observed => "OBSERVED",
            Self::CoverageGap => "COVERAGE_GAP",
            Self::Unproven => "UNPROVEN",
            Self::Unclassifiable => "UNCLASSIFIABLE",
        }
    }

    /// Statuses that mean classification could not decide with confidence.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Suspected | Self::Unproven | Self::Unclassifiable)
    }
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six canonical silent-failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    NavigationSilentFailure,
    SubmitSilentFailure,
    UiFeedbackSilentFailure,
    StateChangeSilentFailure,
    LoadingPhantomFailure,
    PermissionWallSilentFailure,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NavigationSilentFailure => "navigation_silent_failure",
            Self::SubmitSilentFailure => "submit_silent_failure",
            Self::UiFeedbackSilentFailure => "ui_feedback_silent_failure",
            Self::StateChangeSilentFailure => "state_change_silent_failure",
            Self::LoadingPhantomFailure => "loading_phantom_failure",
            Self::PermissionWallSilentFailure => "permission_wall_silent_failure",
        }
    }

    pub fn for_kind(kind: PromiseKind) -> Self {
        match kind {
            PromiseKind::Navigation => Self::NavigationSilentFailure,
            PromiseKind::Submit => Self::SubmitSilentFailure,
            PromiseKind::Feedback => Self::UiFeedbackSilentFailure,
            PromiseKind::State => Self::StateChangeSilentFailure,
            PromiseKind::Loading => Self::LoadingPhantomFailure,
            PromiseKind::Permission => Self::PermissionWallSilentFailure,
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one expectation against its observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectation_id: Option<String>,
    /// Failure class; absent for gate verdicts (observed, coverage gap, ...).
    #[serde(rename = "type")]
    pub failure_class: Option<FailureClass>,
    pub status: VerdictStatus,
    pub confidence: f64,
    /// Signal names that justified the verdict, sorted.
    pub rationale_signals: Vec<String>,
    pub reason: String,
    #[serde(default)]
    pub proven: bool,
}

impl Verdict {
    pub fn new(status: VerdictStatus, reason: impl Into<String>) -> Self {
        Self {
            expectation_id: None,
            failure_class: None,
            status,
            confidence: 0.0,
            rationale_signals: Vec::new(),
            reason: reason.into(),
            proven: false,
        }
    }

    pub fn with_class(mut self, class: FailureClass) -> Self {
        self.failure_class = Some(class);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = round_confidence(confidence);
        self
    }

    pub fn with_rationale(mut self, mut signals: Vec<String>) -> Self {
        signals.sort();
        signals.dedup();
        self.rationale_signals = signals;
        self
    }

    pub fn for_expectation(mut self, id: impl Into<String>, proven: bool) -> Self {
        self.expectation_id = Some(id.into());
        self.proven = proven;
        self
    }

    pub fn is_silent_failure(&self) -> bool {
        self.status == VerdictStatus::Confirmed
    }
}

/// Clamp to `[0, 1]` and round to two decimals so serialized output is stable.
pub fn round_confidence(value: f64) -> f64 {
    (value.clamp(0.0, 1.0) * 100.0).round() / 100.0
}
