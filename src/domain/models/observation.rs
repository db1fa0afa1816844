//! Observations: the recorded evidence of one interaction attempt.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::interaction::InteractionKind;
use super::verdict::VerdictStatus;

/// Named evidence signals derived from before/after comparison.
///
/// Ordering is significant: it fixes the key order of serialized signal maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalKind {
    NavigationChanged,
    RouteChanged,
    MeaningfulDomChange,
    FeedbackSeen,
    AriaLiveUpdated,
    AriaRoleAlertsDetected,
    NetworkActivity,
    LoadingStarted,
    LoadingResolved,
    StateChanged,
    SilentBlock,
    ValidationFeedback,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NavigationChanged => "navigationChanged",
            Self::RouteChanged => "routeChanged",
            Self::MeaningfulDomChange => "meaningfulDomChange",
            Self::FeedbackSeen => "feedbackSeen",
            Self::AriaLiveUpdated => "ariaLiveUpdated",
            Self::AriaRoleAlertsDetected => "ariaRoleAlertsDetected",
            Self::NetworkActivity => "networkActivity",
            Self::LoadingStarted => "loadingStarted",
            Self::LoadingResolved => "loadingResolved",
            Self::StateChanged => "stateChanged",
            Self::SilentBlock => "silentBlock",
            Self::ValidationFeedback => "validationFeedback",
        }
    }

    pub const ALL: [SignalKind; 12] = [
        Self::NavigationChanged,
        Self::RouteChanged,
        Self::MeaningfulDomChange,
        Self::FeedbackSeen,
        Self::AriaLiveUpdated,
        Self::AriaRoleAlertsDetected,
        Self::NetworkActivity,
        Self::LoadingStarted,
        Self::LoadingResolved,
        Self::StateChanged,
        Self::SilentBlock,
        Self::ValidationFeedback,
    ];
}

/// Map of evidence signals. A missing key means "not measured", which is
/// distinct from an explicit `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceSignals(BTreeMap<SignalKind, bool>);

impl EvidenceSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: SignalKind, value: bool) -> Self {
        self.0.insert(kind, value);
        self
    }

    pub fn set(&mut self, kind: SignalKind, value: bool) {
        self.0.insert(kind, value);
    }

    pub fn get(&self, kind: SignalKind) -> Option<bool> {
        self.0.get(&kind).copied()
    }

    /// True only when the signal was measured and came out true.
    pub fn is_true(&self, kind: SignalKind) -> bool {
        self.get(kind).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SignalKind, bool)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// Signals that were measured true, in key order.
    pub fn true_signals(&self) -> Vec<SignalKind> {
        self.iter().filter(|(_, v)| *v).map(|(k, _)| k).collect()
    }
}

/// Proof that the driver actually dispatched the action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptProof {
    pub action: InteractionKind,
    pub selector: String,
}

/// URL and DOM digest on one side of an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    pub url: String,
    pub dom_fingerprint: String,
}

/// Before/after state pair captured around the interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateComparison {
    pub before: PageState,
    pub after: PageState,
}

/// DOM difference record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomDiff {
    pub changed: bool,
    pub element_delta: i64,
}

/// Network activity observed inside the interaction window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEvidence {
    pub requests: u32,
    pub failed: u32,
    pub statuses: Vec<u16>,
}

impl NetworkEvidence {
    pub fn has_auth_block(&self) -> bool {
        self.statuses.iter().any(|s| matches!(s, 401 | 403))
    }
}

/// Strong proof artifacts attached to an observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceArtifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_after: Option<StateComparison>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_diff: Option<DomDiff>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkEvidence>,
}

impl EvidenceArtifacts {
    pub fn is_empty(&self) -> bool {
        self.before_after.is_none() && self.dom_diff.is_none() && self.network.is_none()
    }
}

/// Why an expectation never got an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnattemptedReason {
    RouteNotVisited,
    SelectorNotFound,
    BudgetExhausted,
    SafetySkipped,
    InteractionFailed,
    TimeExhausted,
    /// The flow step carrying it was malformed.
    ValidationFailed,
    /// An earlier flow step failed with `failure_mode: abort`.
    FlowAborted,
}

impl UnattemptedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RouteNotVisited => "route_not_visited",
            Self::SelectorNotFound => "selector_not_found",
            Self::BudgetExhausted => "budget_exhausted",
            Self::SafetySkipped => "safety_skipped",
            Self::InteractionFailed => "interaction_failed",
            Self::TimeExhausted => "time_exhausted",
            Self::ValidationFailed => "validation_failed",
            Self::FlowAborted => "flow_aborted",
        }
    }
}

/// Attached when classification could not reach a confident verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceRecord {
    pub status: VerdictStatus,
    pub reason: String,
}

/// One interaction attempt as recorded by the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectation_id: Option<String>,
    #[serde(default)]
    pub attempted: bool,
    #[serde(default)]
    pub observed: bool,
    /// Whether the full settle window elapsed; `None` when never reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_proof: Option<AttemptProof>,
    #[serde(default)]
    pub evidence_signals: EvidenceSignals,
    #[serde(default, skip_serializing_if = "EvidenceArtifacts::is_empty")]
    pub artifacts: EvidenceArtifacts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unattempted_reason: Option<UnattemptedReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silence_detected: Option<SilenceRecord>,
}

impl Observation {
    /// Observation for an expectation that was never attempted.
    pub fn unattempted(expectation_id: impl Into<String>, reason: UnattemptedReason) -> Self {
        Self {
            expectation_id: Some(expectation_id.into()),
            unattempted_reason: Some(reason),
            ..Self::default()
        }
    }

    /// The settle-completion flag, treating an unreported flag as incomplete.
    pub fn is_run_complete(&self) -> bool {
        self.run_complete.unwrap_or(false)
    }

    /// The only mutation permitted after an observation is produced.
    pub fn attach_silence(&mut self, record: SilenceRecord) {
        self.silence_detected = Some(record);
    }
}
