//! Silent-failure classifier.
//!
//! A pure function of (expectation, observation, signals, run completion).
//! Gates run in a fixed order before any class-specific evaluation:
//!
//! 1. observed outcome: `OBSERVED`
//! 2. never attempted: `COVERAGE_GAP`
//! 3. attempted without any substantive evidence: `UNPROVEN`
//! 4. no recognizable promise kind: `UNCLASSIFIABLE`
//!
//! Past the gates, each [`PromiseKind`] has its own evaluator. An evaluator
//! returns `None` as soon as any of its disconfirming signals is true; the
//! promise evidently produced an outcome. Otherwise it confirms the class,
//! or reports it as SUSPECTED with halved confidence when the settle window
//! did not complete. Every result passes through the Evidence Law.

use crate::domain::models::{
    round_confidence, EvidenceSignals, Expectation, FailureClass, Observation, PromiseKind,
    SignalKind, SilenceRecord, Verdict, VerdictStatus,
};
use crate::services::evidence_law;

use SignalKind::*;

const BASE_CONFIDENCE: f64 = 0.5;
const NO_FEEDBACK_BONUS: f64 = 0.2;
const NO_DOM_CHANGE_BONUS: f64 = 0.15;
const NO_NAVIGATION_BONUS: f64 = 0.15;
const DISCONFIRMING_PENALTY: f64 = 0.25;

/// Inputs shared by the per-kind evaluators.
struct Evidence<'a> {
    signals: &'a EvidenceSignals,
    run_complete: bool,
}

impl Evidence<'_> {
    fn present(&self, disconfirming: &[SignalKind]) -> Vec<SignalKind> {
        disconfirming
            .iter()
            .copied()
            .filter(|s| self.signals.is_true(*s))
            .collect()
    }

    /// Build the class verdict once no disconfirming signal is present.
    fn conclude(&self, kind: PromiseKind, required: &[SignalKind], reason: &str) -> Verdict {
        let class = FailureClass::for_kind(kind);
        let disconfirming = disconfirming_signals(kind);
        let confidence = score_confidence(self.signals, disconfirming);
        let mut rationale: Vec<String> = disconfirming
            .iter()
            .map(|s| format!("{}=false", s.as_str()))
            .collect();
        rationale.extend(required.iter().map(|s| format!("{}=true", s.as_str())));

        if self.run_complete {
            rationale.push("runComplete=true".to_string());
            Verdict::new(VerdictStatus::Confirmed, reason)
                .with_class(class)
                .with_confidence(confidence)
                .with_rationale(rationale)
        } else {
            rationale.push("runComplete=false".to_string());
            Verdict::new(
                VerdictStatus::Suspected,
                format!("{reason} (settle window incomplete)"),
            )
            .with_class(class)
            .with_confidence(confidence / 2.0)
            .with_rationale(rationale)
        }
    }
}

/// Confidence for a class given its disconfirming signal set.
///
/// Base 0.5, +0.2 without feedback, +0.15 without a DOM change, +0.15
/// without navigation, -0.25 per disconfirming signal present. Clamped to
/// `[0, 1]` and rounded to two decimals.
pub fn score_confidence(signals: &EvidenceSignals, disconfirming: &[SignalKind]) -> f64 {
    let mut confidence = BASE_CONFIDENCE;
    if !signals.is_true(FeedbackSeen) {
        confidence += NO_FEEDBACK_BONUS;
    }
    if !signals.is_true(MeaningfulDomChange) {
        confidence += NO_DOM_CHANGE_BONUS;
    }
    if !signals.is_true(NavigationChanged) && !signals.is_true(RouteChanged) {
        confidence += NO_NAVIGATION_BONUS;
    }
    let present = disconfirming.iter().filter(|s| signals.is_true(**s)).count();
    confidence -= DISCONFIRMING_PENALTY * present as f64;
    round_confidence(confidence)
}

/// Signals that disprove a silent failure for `kind`.
pub fn disconfirming_signals(kind: PromiseKind) -> &'static [SignalKind] {
    match kind {
        PromiseKind::Navigation => &[NavigationChanged, RouteChanged, MeaningfulDomChange, FeedbackSeen],
        // network activity alone does not show the user anything
        PromiseKind::Submit => &[
            FeedbackSeen,
            ValidationFeedback,
            MeaningfulDomChange,
            NavigationChanged,
            AriaLiveUpdated,
            AriaRoleAlertsDetected,
        ],
        PromiseKind::Feedback => &[
            FeedbackSeen,
            ValidationFeedback,
            AriaLiveUpdated,
            AriaRoleAlertsDetected,
            MeaningfulDomChange,
            NavigationChanged,
        ],
        PromiseKind::State => &[MeaningfulDomChange, FeedbackSeen, StateChanged],
        PromiseKind::Loading => &[LoadingResolved, NavigationChanged, MeaningfulDomChange, FeedbackSeen],
        PromiseKind::Permission => &[FeedbackSeen, AriaRoleAlertsDetected, NavigationChanged, RouteChanged],
    }
}

fn any_disconfirming(evidence: &Evidence<'_>, kind: PromiseKind) -> bool {
    !evidence.present(disconfirming_signals(kind)).is_empty()
}

fn evaluate_navigation(evidence: &Evidence<'_>) -> Option<Verdict> {
    let kind = PromiseKind::Navigation;
    if any_disconfirming(evidence, kind) {
        return None;
    }
    Some(evidence.conclude(
        kind,
        &[],
        "navigation promised but URL, route, DOM and feedback were unchanged",
    ))
}

fn evaluate_submit(evidence: &Evidence<'_>) -> Option<Verdict> {
    let kind = PromiseKind::Submit;
    if any_disconfirming(evidence, kind) {
        return None;
    }
    Some(evidence.conclude(
        kind,
        &[],
        "submission produced no feedback and no DOM outcome",
    ))
}

fn evaluate_feedback(evidence: &Evidence<'_>) -> Option<Verdict> {
    let kind = PromiseKind::Feedback;
    if any_disconfirming(evidence, kind) {
        return None;
    }
    Some(evidence.conclude(
        kind,
        &[],
        "action produced no visible or announced feedback",
    ))
}

fn evaluate_state(evidence: &Evidence<'_>) -> Option<Verdict> {
    let kind = PromiseKind::State;
    if any_disconfirming(evidence, kind) {
        return None;
    }
    Some(evidence.conclude(
        kind,
        &[],
        "state mutation produced no DOM outcome and no feedback",
    ))
}

fn evaluate_loading(evidence: &Evidence<'_>) -> Option<Verdict> {
    let kind = PromiseKind::Loading;
    if !evidence.signals.is_true(LoadingStarted) || any_disconfirming(evidence, kind) {
        return None;
    }
    Some(evidence.conclude(
        kind,
        &[LoadingStarted],
        "loading started and never resolved into an outcome",
    ))
}

fn evaluate_permission(evidence: &Evidence<'_>) -> Option<Verdict> {
    let kind = PromiseKind::Permission;
    if !evidence.signals.is_true(SilentBlock) || any_disconfirming(evidence, kind) {
        return None;
    }
    Some(evidence.conclude(
        kind,
        &[SilentBlock],
        "action was blocked without denial feedback or redirect",
    ))
}

/// Classify one expectation against its observation.
///
/// Returns `None` when the evidence disproves a silent failure. Never
/// panics or errors on malformed input.
pub fn classify(
    expectation: &Expectation,
    observation: &Observation,
    signals: &EvidenceSignals,
    run_complete: bool,
) -> Option<Verdict> {
    let tag = |verdict: Verdict| verdict.for_expectation(&expectation.id, expectation.proven);

    if observation.observed {
        return Some(tag(
            Verdict::new(VerdictStatus::Observed, "promised outcome observed").with_confidence(1.0),
        ));
    }

    if !observation.attempted {
        let reason = observation
            .unattempted_reason
            .map_or("not attempted", |r| r.as_str());
        return Some(tag(Verdict::new(VerdictStatus::CoverageGap, reason)));
    }

    if observation.attempt_proof.is_none() && signals.is_empty() && observation.run_complete.is_none()
    {
        return Some(tag(Verdict::new(
            VerdictStatus::Unproven,
            "attempted without attempt proof or evidence signals",
        )));
    }

    let Some(kind) = expectation.promise_kind() else {
        return Some(tag(Verdict::new(
            VerdictStatus::Unclassifiable,
            "promise kind could not be determined",
        )));
    };

    let evidence = Evidence {
        signals,
        run_complete,
    };
    let verdict = match kind {
        PromiseKind::Navigation => evaluate_navigation(&evidence),
        PromiseKind::Submit => evaluate_submit(&evidence),
        PromiseKind::Feedback => evaluate_feedback(&evidence),
        PromiseKind::State => evaluate_state(&evidence),
        PromiseKind::Loading => evaluate_loading(&evidence),
        PromiseKind::Permission => evaluate_permission(&evidence),
    }?;

    Some(tag(evidence_law::enforce(verdict, observation, signals)))
}

/// Silence record for verdicts that did not reach a confident conclusion.
pub fn silence_record(verdict: &Verdict) -> Option<SilenceRecord> {
    verdict.status.is_ambiguous().then(|| SilenceRecord {
        status: verdict.status,
        reason: verdict.reason.clone(),
    })
}
