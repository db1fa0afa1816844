//! `tacit classify`: post-hoc classification of recorded observations.

use anyhow::Result;
use clap::Args;
use std::collections::HashMap;
use std::path::PathBuf;

use super::scan::truth_lines;
use super::{load_expectations, read_document};
use crate::cli::output::{output, truncate, CommandOutput};
use crate::cli::table::{list_table, render_list};
use crate::domain::models::{
    Config, Decision, Expectation, Observation, RunSummary, RunTruth, Verdict,
};
use crate::services::{silent_failure, truth_classifier, DecisionAuthority};

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Expectations document (YAML or JSON)
    #[arg(short, long)]
    pub expectations: PathBuf,

    /// Recorded observations: a list keyed by `expectationId`
    #[arg(short, long)]
    pub observations: PathBuf,

    /// Treat the recording as coming from a failed run
    #[arg(long)]
    pub infrastructure_failure: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct ClassifyOutput {
    pub verdicts: Vec<Verdict>,
    pub summary: RunSummary,
    pub truth: RunTruth,
    pub decision: Decision,
}

impl CommandOutput for ClassifyOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["expectation", "status", "class", "confidence", "signals"]);
        for verdict in &self.verdicts {
            table.add_row(vec![
                verdict.expectation_id.clone().unwrap_or_default(),
                verdict.status.as_str().to_string(),
                verdict
                    .failure_class
                    .map(|c| c.as_str().to_string())
                    .unwrap_or_default(),
                format!("{:.2}", verdict.confidence),
                truncate(&verdict.rationale_signals.join(", "), 50),
            ]);
        }

        let mut lines = vec![render_list("verdict", &table, self.verdicts.len()), String::new()];
        lines.extend(truth_lines(&self.truth));
        lines.push(format!(
            "Decision: {} (exit {})",
            self.decision.verdict.label(),
            self.decision.exit_code
        ));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Classify each expectation against its recorded observation.
///
/// Expectations without a recording get no verdict and count as
/// `no_observation` in the summary. The returned observations carry a
/// silence record wherever classification stayed inconclusive.
pub fn classify_recorded(
    expectations: &[Expectation],
    observations: Vec<Observation>,
) -> (Vec<Observation>, Vec<Verdict>) {
    let mut by_id: HashMap<String, Observation> = observations
        .into_iter()
        .filter_map(|o| o.expectation_id.clone().map(|id| (id, o)))
        .collect();

    let mut recorded = Vec::new();
    let mut verdicts = Vec::new();
    for expectation in expectations {
        let Some(mut observation) = by_id.remove(&expectation.id) else {
            continue;
        };
        let run_complete = observation.is_run_complete();
        if let Some(verdict) = silent_failure::classify(
            expectation,
            &observation,
            &observation.evidence_signals,
            run_complete,
        ) {
            if let Some(record) = silent_failure::silence_record(&verdict) {
                observation.attach_silence(record);
            }
            verdicts.push(verdict);
        }
        recorded.push(observation);
    }
    (recorded, verdicts)
}

pub fn execute(args: ClassifyArgs, config: &Config, json_mode: bool) -> Result<i32> {
    let expectations = load_expectations(&args.expectations)?;
    let observations: Vec<Observation> = read_document(&args.observations)?;

    let (observations, verdicts) = classify_recorded(&expectations, observations);
    let summary = RunSummary::from_verdicts(
        &expectations,
        &observations,
        &verdicts,
        args.infrastructure_failure,
    );
    let truth = truth_classifier::classify(&summary, &config.truth);
    let decision = DecisionAuthority::new(config.policy.clone()).decide(&truth, &summary);

    let exit_code = decision.exit_code;
    output(
        &ClassifyOutput {
            verdicts,
            summary,
            truth,
            decision,
        },
        json_mode,
    );
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EvidenceSignals, SignalKind, VerdictStatus};

    fn attempted(id: &str, signals: EvidenceSignals) -> Observation {
        Observation {
            expectation_id: Some(id.to_string()),
            attempted: true,
            run_complete: Some(true),
            evidence_signals: signals,
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_recorded_confirms_silent_navigation() {
        let expectations = vec![Expectation::new("nav", "navigation")];
        let signals = EvidenceSignals::new()
            .with(SignalKind::NavigationChanged, false)
            .with(SignalKind::RouteChanged, false)
            .with(SignalKind::MeaningfulDomChange, false)
            .with(SignalKind::FeedbackSeen, false);

        let (observations, verdicts) =
            classify_recorded(&expectations, vec![attempted("nav", signals)]);

        assert_eq!(observations.len(), 1);
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].status, VerdictStatus::Confirmed);
        assert_eq!(verdicts[0].expectation_id.as_deref(), Some("nav"));
    }

    #[test]
    fn test_missing_recording_counts_as_no_observation() {
        let expectations = vec![
            Expectation::new("a", "navigation"),
            Expectation::new("b", "submit"),
        ];
        let signals = EvidenceSignals::new().with(SignalKind::NavigationChanged, true);
        let (observations, verdicts) =
            classify_recorded(&expectations, vec![attempted("a", signals)]);

        let summary = RunSummary::from_verdicts(&expectations, &observations, &verdicts, false);
        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.unattempted_breakdown.get("no_observation"), Some(&1));
    }

    #[test]
    fn test_unproven_attempt_gets_silence_record() {
        let expectations = vec![Expectation::new("s", "submit")];
        let observation = Observation {
            expectation_id: Some("s".to_string()),
            attempted: true,
            ..Default::default()
        };
        let (observations, verdicts) = classify_recorded(&expectations, vec![observation]);

        assert_eq!(verdicts[0].status, VerdictStatus::Unproven);
        assert!(observations[0].silence_detected.is_some());
    }
}
