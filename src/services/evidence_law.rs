//! Evidence Law: no CONFIRMED verdict without substantive proof.
//!
//! Re-checks every CONFIRMED verdict independently of the evaluator that
//! produced it. A verdict lacking a strong proof artifact, or produced from
//! an observation flagged as incomplete, is downgraded to SUSPECTED before
//! it is surfaced.

use tracing::debug;

use crate::domain::models::{EvidenceSignals, Observation, Verdict, VerdictStatus};

/// A before/after pair, a DOM diff, network evidence, or at least one
/// explicitly measured signal.
pub fn has_strong_proof(observation: &Observation, signals: &EvidenceSignals) -> bool {
    let artifacts = &observation.artifacts;
    artifacts.before_after.is_some()
        || artifacts.dom_diff.is_some()
        || artifacts.network.is_some()
        || !signals.is_empty()
}

/// Apply the law to `verdict`. Non-CONFIRMED verdicts pass through unchanged.
pub fn enforce(verdict: Verdict, observation: &Observation, signals: &EvidenceSignals) -> Verdict {
    if verdict.status != VerdictStatus::Confirmed {
        return verdict;
    }

    let missing = if observation.run_complete == Some(false) {
        Some("settle window incomplete")
    } else if !has_strong_proof(observation, signals) {
        Some("no strong proof artifact")
    } else {
        None
    };

    match missing {
        None => verdict,
        Some(why) => {
            debug!(
                expectation = verdict.expectation_id.as_deref().unwrap_or("-"),
                why, "downgrading CONFIRMED verdict"
            );
            let confidence = verdict.confidence / 2.0;
            let reason = format!("{} (downgraded: {why})", verdict.reason);
            Verdict {
                status: VerdictStatus::Suspected,
                reason,
                ..verdict
            }
            .with_confidence(confidence)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DomDiff, SignalKind};

    fn confirmed() -> Verdict {
        Verdict::new(VerdictStatus::Confirmed, "no effect").with_confidence(1.0)
    }

    fn complete() -> Observation {
        Observation {
            attempted: true,
            run_complete: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_confirmed_without_proof_is_downgraded() {
        let verdict = enforce(confirmed(), &complete(), &EvidenceSignals::new());
        assert_eq!(verdict.status, VerdictStatus::Suspected);
        assert_eq!(verdict.confidence, 0.5);
        assert!(verdict.reason.contains("no strong proof"));
    }

    #[test]
    fn test_explicit_signal_is_strong_proof() {
        let signals = EvidenceSignals::new().with(SignalKind::FeedbackSeen, false);
        let verdict = enforce(confirmed(), &complete(), &signals);
        assert_eq!(verdict.status, VerdictStatus::Confirmed);
    }

    #[test]
    fn test_dom_diff_is_strong_proof() {
        let mut observation = complete();
        observation.artifacts.dom_diff = Some(DomDiff {
            changed: false,
            element_delta: 0,
        });
        assert!(has_strong_proof(&observation, &EvidenceSignals::new()));
    }

    #[test]
    fn test_incomplete_run_is_downgraded() {
        let mut observation = complete();
        observation.run_complete = Some(false);
        let signals = EvidenceSignals::new().with(SignalKind::FeedbackSeen, false);
        let verdict = enforce(confirmed(), &observation, &signals);
        assert_eq!(verdict.status, VerdictStatus::Suspected);
    }

    #[test]
    fn test_other_statuses_pass_through() {
        let verdict = Verdict::new(VerdictStatus::Unproven, "nothing");
        assert_eq!(
            enforce(verdict.clone(), &Observation::default(), &EvidenceSignals::new()),
            verdict
        );
    }
}
