use proptest::prelude::*;
use std::collections::BTreeMap;

use tacit::domain::models::{
    AttemptProof, EvidenceSignals, Expectation, InteractionKind, Observation, PromiseKind,
    SignalKind, TruthThresholds,
};
use tacit::services::evidence_law::has_strong_proof;
use tacit::services::silent_failure::{classify, disconfirming_signals};
use tacit::services::truth_classifier;
use tacit::{RunSummary, TruthState, VerdictStatus};

const DECLARED_TYPES: &[&str] = &[
    "navigation",
    "submit",
    "feedback",
    "state",
    "loading",
    "permission",
    "mystery",
];

fn signals_strategy() -> impl Strategy<Value = EvidenceSignals> {
    prop::collection::btree_map(
        prop::sample::select(SignalKind::ALL.to_vec()),
        any::<bool>(),
        0..=SignalKind::ALL.len(),
    )
    .prop_map(|map: BTreeMap<SignalKind, bool>| {
        map.into_iter()
            .fold(EvidenceSignals::new(), |signals, (kind, value)| signals.with(kind, value))
    })
}

fn observation_strategy() -> impl Strategy<Value = Observation> {
    (
        any::<bool>(),
        any::<bool>(),
        prop::option::of(any::<bool>()),
        any::<bool>(),
        signals_strategy(),
    )
        .prop_map(|(attempted, observed, run_complete, with_proof, evidence_signals)| Observation {
            expectation_id: Some("e".to_string()),
            attempted,
            observed,
            run_complete,
            attempt_proof: with_proof.then(|| AttemptProof {
                action: InteractionKind::Button,
                selector: "#target".to_string(),
            }),
            evidence_signals,
            ..Default::default()
        })
}

fn expectation_strategy() -> impl Strategy<Value = Expectation> {
    prop::sample::select(DECLARED_TYPES.to_vec()).prop_map(|t| Expectation::new("e", t))
}

proptest! {
    /// Property: classification is a pure function of its inputs
    #[test]
    fn prop_classify_is_deterministic(
        expectation in expectation_strategy(),
        observation in observation_strategy(),
    ) {
        let run_complete = observation.is_run_complete();
        let first = classify(&expectation, &observation, &observation.evidence_signals, run_complete);
        let second = classify(&expectation, &observation, &observation.evidence_signals, run_complete);
        prop_assert_eq!(first, second);
    }

    /// Property: CONFIRMED never appears without a complete run and strong proof
    #[test]
    fn prop_confirmed_requires_complete_run_and_proof(
        expectation in expectation_strategy(),
        observation in observation_strategy(),
        claimed_complete in any::<bool>(),
    ) {
        if let Some(verdict) = classify(
            &expectation,
            &observation,
            &observation.evidence_signals,
            claimed_complete,
        ) {
            if verdict.status == VerdictStatus::Confirmed {
                prop_assert!(claimed_complete);
                prop_assert_ne!(observation.run_complete, Some(false));
                prop_assert!(observation.attempted);
                prop_assert!(!observation.observed);
                prop_assert!(has_strong_proof(&observation, &observation.evidence_signals));
            }
        }
    }

    /// Property: a true disconfirming signal rules out a silent-failure verdict
    #[test]
    fn prop_disconfirming_signal_prevents_failure(
        expectation in expectation_strategy(),
        observation in observation_strategy(),
    ) {
        let Some(kind) = expectation.promise_kind() else {
            return Ok(());
        };
        let disconfirmed = disconfirming_signals(kind)
            .iter()
            .any(|s| observation.evidence_signals.is_true(*s));
        let verdict = classify(
            &expectation,
            &observation,
            &observation.evidence_signals,
            observation.is_run_complete(),
        );
        if disconfirmed {
            if let Some(verdict) = verdict {
                prop_assert!(!verdict.is_silent_failure());
                prop_assert_ne!(verdict.status, VerdictStatus::Suspected);
            }
        }
    }

    /// Property: unattempted work is a coverage gap, never a failure
    #[test]
    fn prop_unattempted_is_coverage_gap(
        expectation in expectation_strategy(),
        mut observation in observation_strategy(),
    ) {
        observation.attempted = false;
        observation.observed = false;
        let verdict = classify(
            &expectation,
            &observation,
            &observation.evidence_signals,
            observation.is_run_complete(),
        );
        prop_assert_eq!(verdict.map(|v| v.status), Some(VerdictStatus::CoverageGap));
    }

    /// Property: confidence always stays within [0, 1]
    #[test]
    fn prop_confidence_in_unit_range(
        expectation in expectation_strategy(),
        observation in observation_strategy(),
    ) {
        if let Some(verdict) = classify(
            &expectation,
            &observation,
            &observation.evidence_signals,
            observation.is_run_complete(),
        ) {
            prop_assert!((0.0..=1.0).contains(&verdict.confidence));
        }
    }

    /// Property: loading needs loadingStarted and permission needs silentBlock
    #[test]
    fn prop_required_signals_gate_their_class(
        observation in observation_strategy(),
    ) {
        for (declared, required) in [
            ("loading", SignalKind::LoadingStarted),
            ("permission", SignalKind::SilentBlock),
        ] {
            if observation.evidence_signals.is_true(required) {
                continue;
            }
            let expectation = Expectation::new("e", declared);
            let verdict = classify(
                &expectation,
                &observation,
                &observation.evidence_signals,
                observation.is_run_complete(),
            );
            prop_assert!(verdict.map_or(true, |v| !v.is_silent_failure()
                && v.status != VerdictStatus::Suspected));
        }
    }

    /// Property: a run whose summary has confirmed failures and no
    /// infrastructure failure is FINDINGS at any coverage
    #[test]
    fn prop_findings_dominate_coverage(
        total in 1u32..50,
        attempted_fraction in 0.01f64..=1.0,
        silent in 1u32..5,
    ) {
        let attempted = ((f64::from(total) * attempted_fraction).ceil() as u32).clamp(1, total);
        let summary = RunSummary {
            expectations_total: total,
            attempted,
            silent_failures: silent,
            coverage_ratio: f64::from(attempted) / f64::from(total),
            ..Default::default()
        };
        let truth = truth_classifier::classify(&summary, &TruthThresholds::default());
        prop_assert_eq!(truth.truth_state, TruthState::Findings);
    }
}

#[test]
fn test_every_kind_has_disconfirming_signals() {
    for kind in [
        PromiseKind::Navigation,
        PromiseKind::Submit,
        PromiseKind::Feedback,
        PromiseKind::State,
        PromiseKind::Loading,
        PromiseKind::Permission,
    ] {
        assert!(!disconfirming_signals(kind).is_empty(), "{kind:?}");
    }
}
