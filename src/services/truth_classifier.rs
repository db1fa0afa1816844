//! Run-level truth classification.
//!
//! Aggregates observations and verdicts into a [`RunSummary`], then maps the
//! summary to exactly one of SUCCESS, FINDINGS or INCOMPLETE. Rules are
//! checked in priority order and the first match wins:
//!
//! 1. infrastructure failure, or expectations with zero attempts: INCOMPLETE/LOW
//! 2. zero expectations: SUCCESS/HIGH
//! 3. any confirmed silent failure: FINDINGS/HIGH, whatever the coverage
//! 4. incomplete run or any critical silence: INCOMPLETE
//! 5. coverage at or above the threshold: SUCCESS/HIGH
//! 6. otherwise INCOMPLETE, MEDIUM above 50% coverage, else LOW

use std::collections::{BTreeMap, HashMap};

use tracing::info;

use crate::domain::models::{
    round_confidence, CoverageSummary, CriticalSilenceKind, Expectation, Observation,
    PromiseKind, ReasonCount, RunSummary, RunTruth, TruthConfidence, TruthState,
    TruthThresholds, Verdict, VerdictStatus, INCOMPLETE_SAFETY_STATEMENT,
};

const MAX_TOP_REASONS: usize = 5;

impl RunSummary {
    /// Build the summary for one run.
    ///
    /// Observations and verdicts are matched to expectations by id. An
    /// expectation without any observation counts as unattempted.
    pub fn from_verdicts(
        expectations: &[Expectation],
        observations: &[Observation],
        verdicts: &[Verdict],
        infrastructure_failure: bool,
    ) -> Self {
        let kinds: HashMap<&str, Option<PromiseKind>> = expectations
            .iter()
            .map(|e| (e.id.as_str(), e.promise_kind()))
            .collect();
        let by_id: HashMap<&str, &Observation> = observations
            .iter()
            .filter_map(|o| o.expectation_id.as_deref().map(|id| (id, o)))
            .collect();

        let mut summary = Self {
            expectations_total: expectations.len() as u32,
            infrastructure_failure,
            ..Self::default()
        };

        for expectation in expectations {
            match by_id.get(expectation.id.as_str()) {
                Some(observation) if observation.attempted => {
                    summary.attempted += 1;
                    if observation.observed {
                        summary.observed += 1;
                    }
                    if observation.run_complete == Some(false) {
                        summary.is_incomplete = true;
                        *summary
                            .incomplete_reasons
                            .entry("settle_timeout".to_string())
                            .or_insert(0) += 1;
                    }
                }
                Some(observation) => {
                    let reason = observation
                        .unattempted_reason
                        .map_or("not_attempted", |r| r.as_str());
                    *summary
                        .unattempted_breakdown
                        .entry(reason.to_string())
                        .or_insert(0) += 1;
                }
                None => {
                    *summary
                        .unattempted_breakdown
                        .entry("no_observation".to_string())
                        .or_insert(0) += 1;
                }
            }
        }

        for verdict in verdicts {
            match verdict.status {
                VerdictStatus::Confirmed => summary.silent_failures += 1,
                VerdictStatus::Suspected => summary.suspected += 1,
                _ => {}
            }
            let kind = verdict
                .expectation_id
                .as_deref()
                .and_then(|id| kinds.get(id).copied().flatten());
            if let Some(silence) = critical_silence(verdict.status, kind) {
                *summary.critical_silences.entry(silence).or_insert(0) += 1;
            }
        }

        summary.coverage_ratio = round_confidence(summary.exact_coverage());
        summary
    }
}

/// Which ambiguous outcomes block a SUCCESS verdict.
pub fn critical_silence(
    status: VerdictStatus,
    kind: Option<PromiseKind>,
) -> Option<CriticalSilenceKind> {
    match (status, kind) {
        (VerdictStatus::Unclassifiable, _) => Some(CriticalSilenceKind::AmbiguousIntent),
        (VerdictStatus::Suspected | VerdictStatus::Unproven, Some(PromiseKind::Navigation)) => {
            Some(CriticalSilenceKind::AmbiguousNavigation)
        }
        (VerdictStatus::Suspected | VerdictStatus::Unproven, Some(PromiseKind::Submit)) => {
            Some(CriticalSilenceKind::AmbiguousSubmission)
        }
        _ => None,
    }
}

/// Counts sorted by count descending, then key ascending, capped at five.
pub fn top_reasons(summary: &RunSummary) -> Vec<ReasonCount> {
    let mut merged: BTreeMap<String, u32> = BTreeMap::new();
    let sources = summary
        .incomplete_reasons
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .chain(summary.unattempted_breakdown.iter().map(|(k, v)| (k.clone(), *v)))
        .chain(
            summary
                .critical_silences
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), *v)),
        );
    for (key, count) in sources {
        *merged.entry(key).or_insert(0) += count;
    }

    let mut reasons: Vec<ReasonCount> = merged
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(key, count)| ReasonCount { key, count })
        .collect();
    reasons.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    reasons.truncate(MAX_TOP_REASONS);
    reasons
}

fn coverage_summary(summary: &RunSummary) -> CoverageSummary {
    CoverageSummary {
        expectations_total: summary.expectations_total,
        attempted: summary.attempted,
        observed: summary.observed,
        coverage_ratio: summary.coverage_ratio,
        unattempted_breakdown: summary.unattempted_breakdown.clone(),
    }
}

/// Map a run summary to its truth state. Pure.
pub fn classify(summary: &RunSummary, thresholds: &TruthThresholds) -> RunTruth {
    let (truth_state, confidence, explanation) = decide(summary, thresholds);

    let truth = RunTruth {
        truth_state,
        confidence,
        explanation,
        safety_statement: (truth_state == TruthState::Incomplete)
            .then(|| INCOMPLETE_SAFETY_STATEMENT.to_string()),
        top_reasons: top_reasons(summary),
        coverage_summary: coverage_summary(summary),
    };
    info!(
        truth = truth.truth_state.as_str(),
        confidence = truth.confidence.as_str(),
        coverage = summary.coverage_ratio,
        "run truth classified"
    );
    truth
}

fn decide(summary: &RunSummary, thresholds: &TruthThresholds) -> (TruthState, TruthConfidence, String) {
    let coverage = summary.exact_coverage();
    let pct = coverage * 100.0;

    if summary.infrastructure_failure {
        return (
            TruthState::Incomplete,
            TruthConfidence::Low,
            "infrastructure failure: the scan could not complete".to_string(),
        );
    }
    if summary.attempted == 0 && summary.expectations_total > 0 {
        return (
            TruthState::Incomplete,
            TruthConfidence::Low,
            format!(
                "none of {} expectations were attempted",
                summary.expectations_total
            ),
        );
    }
    if summary.expectations_total == 0 {
        return (
            TruthState::Success,
            TruthConfidence::High,
            "nothing to verify: no expectations declared".to_string(),
        );
    }
    if summary.silent_failures > 0 {
        return (
            TruthState::Findings,
            TruthConfidence::High,
            format!(
                "{} silent failure{} confirmed ({pct:.0}% coverage)",
                summary.silent_failures,
                if summary.silent_failures == 1 { "" } else { "s" }
            ),
        );
    }
    let critical = summary.critical_silence_total();
    if summary.is_incomplete || critical > 0 {
        let confidence = if coverage > 0.5 {
            TruthConfidence::Medium
        } else {
            TruthConfidence::Low
        };
        let explanation = if critical > 0 {
            format!("{critical} ambiguous outcome(s) block a confident result")
        } else {
            "the run did not complete its observation windows".to_string()
        };
        return (TruthState::Incomplete, confidence, explanation);
    }
    if coverage >= thresholds.min_coverage {
        return (
            TruthState::Success,
            TruthConfidence::High,
            format!(
                "{} of {} expectations attempted, no silent failures",
                summary.attempted, summary.expectations_total
            ),
        );
    }

    let confidence = if coverage > 0.5 {
        TruthConfidence::Medium
    } else {
        TruthConfidence::Low
    };
    (
        TruthState::Incomplete,
        confidence,
        format!(
            "coverage {pct:.0}% is below the {:.0}% threshold",
            thresholds.min_coverage * 100.0
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::UnattemptedReason;

    fn summary(total: u32, attempted: u32, silent: u32) -> RunSummary {
        RunSummary {
            expectations_total: total,
            attempted,
            silent_failures: silent,
            coverage_ratio: if total == 0 {
                1.0
            } else {
                f64::from(attempted) / f64::from(total)
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_infrastructure_failure_wins() {
        let mut s = summary(10, 10, 3);
        s.infrastructure_failure = true;
        let truth = classify(&s, &TruthThresholds::default());
        assert_eq!(truth.truth_state, TruthState::Incomplete);
        assert_eq!(truth.confidence, TruthConfidence::Low);
        assert_eq!(
            truth.safety_statement.as_deref(),
            Some(INCOMPLETE_SAFETY_STATEMENT)
        );
    }

    #[test]
    fn test_zero_attempts_is_incomplete() {
        let truth = classify(&summary(5, 0, 0), &TruthThresholds::default());
        assert_eq!(truth.truth_state, TruthState::Incomplete);
        assert_eq!(truth.confidence, TruthConfidence::Low);
    }

    #[test]
    fn test_nothing_to_verify() {
        let truth = classify(&summary(0, 0, 0), &TruthThresholds::default());
        assert_eq!(truth.truth_state, TruthState::Success);
        assert!(truth.safety_statement.is_none());
    }

    #[test]
    fn test_findings_regardless_of_coverage() {
        let mut s = summary(50, 10, 1);
        s.is_incomplete = true;
        let truth = classify(&s, &TruthThresholds::default());
        assert_eq!(truth.truth_state, TruthState::Findings);
        assert_eq!(truth.confidence, TruthConfidence::High);
    }

    #[test]
    fn test_low_coverage_incomplete_never_success() {
        let mut s = summary(50, 10, 0);
        s.is_incomplete = true;
        let truth = classify(&s, &TruthThresholds { min_coverage: 0.90 });
        assert_eq!(truth.truth_state, TruthState::Incomplete);
        assert_eq!(truth.confidence, TruthConfidence::Low);
    }

    #[test]
    fn test_critical_silence_blocks_success() {
        let mut s = summary(10, 10, 0);
        s.critical_silences
            .insert(CriticalSilenceKind::AmbiguousNavigation, 1);
        let truth = classify(&s, &TruthThresholds::default());
        assert_eq!(truth.truth_state, TruthState::Incomplete);
        assert_eq!(truth.confidence, TruthConfidence::Medium);
        assert_eq!(truth.top_reasons[0].key, "ambiguous_navigation");
    }

    #[test]
    fn test_coverage_threshold() {
        let truth = classify(&summary(10, 9, 0), &TruthThresholds::default());
        assert_eq!(truth.truth_state, TruthState::Success);

        let truth = classify(&summary(10, 6, 0), &TruthThresholds::default());
        assert_eq!(truth.truth_state, TruthState::Incomplete);
        assert_eq!(truth.confidence, TruthConfidence::Medium);
    }

    #[test]
    fn test_coverage_just_below_threshold_is_incomplete() {
        let expectations: Vec<Expectation> = (0..1000)
            .map(|i| Expectation::new(format!("e{i}"), "navigation"))
            .collect();
        let observations: Vec<Observation> = expectations
            .iter()
            .take(899)
            .map(|e| Observation {
                expectation_id: Some(e.id.clone()),
                attempted: true,
                observed: true,
                run_complete: Some(true),
                ..Default::default()
            })
            .collect();

        let s = RunSummary::from_verdicts(&expectations, &observations, &[], false);
        // reported ratio rounds up to the threshold
        assert_eq!(s.coverage_ratio, 0.9);

        let truth = classify(&s, &TruthThresholds { min_coverage: 0.90 });
        assert_eq!(truth.truth_state, TruthState::Incomplete);
        assert_eq!(truth.confidence, TruthConfidence::Medium);
        assert_eq!(truth.coverage_summary.coverage_ratio, 0.9);
    }

    #[test]
    fn test_top_reasons_ordering_and_cap() {
        let mut s = summary(20, 1, 0);
        for (key, count) in [("b", 3), ("a", 3), ("c", 5), ("d", 1), ("e", 1), ("f", 1)] {
            s.unattempted_breakdown.insert(key.to_string(), count);
        }
        let keys: Vec<String> = top_reasons(&s).into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["c", "a", "b", "d", "e"]);
    }

    #[test]
    fn test_summary_from_verdicts() {
        let expectations = vec![
            Expectation::new("nav", "navigation"),
            Expectation::new("sub", "submit"),
            Expectation::new("odd", "mystery"),
            Expectation::new("gone", "feedback"),
        ];
        let observations = vec![
            Observation {
                expectation_id: Some("nav".into()),
                attempted: true,
                run_complete: Some(true),
                ..Default::default()
            },
            Observation {
                expectation_id: Some("sub".into()),
                attempted: true,
                run_complete: Some(false),
                ..Default::default()
            },
            Observation {
                expectation_id: Some("odd".into()),
                attempted: true,
                run_complete: Some(true),
                ..Default::default()
            },
            Observation::unattempted("gone", UnattemptedReason::SafetySkipped),
        ];
        let verdicts = vec![
            Verdict::new(VerdictStatus::Confirmed, "x").for_expectation("nav", false),
            Verdict::new(VerdictStatus::Suspected, "x").for_expectation("sub", false),
            Verdict::new(VerdictStatus::Unclassifiable, "x").for_expectation("odd", false),
            Verdict::new(VerdictStatus::CoverageGap, "x").for_expectation("gone", false),
        ];

        let s = RunSummary::from_verdicts(&expectations, &observations, &verdicts, false);
        assert_eq!(s.expectations_total, 4);
        assert_eq!(s.attempted, 3);
        assert_eq!(s.silent_failures, 1);
        assert_eq!(s.suspected, 1);
        assert_eq!(s.coverage_ratio, 0.75);
        assert!(s.is_incomplete);
        assert_eq!(s.unattempted_breakdown.get("safety_skipped"), Some(&1));
        assert_eq!(
            s.critical_silences.get(&CriticalSilenceKind::AmbiguousSubmission),
            Some(&1)
        );
        assert_eq!(
            s.critical_silences.get(&CriticalSilenceKind::AmbiguousIntent),
            Some(&1)
        );
    }
}
