//! End-to-end scans against the scripted driver.
//!
//! Time is paused, so settle windows, delayed effects and timeouts advance
//! deterministically and the tests run instantly.

mod common;

use chrono::Utc;
use common::*;
use tacit::domain::models::{
    BudgetProfile, DeterminismFactor, FailureClass, InteractionDescriptor, InteractionKind,
    SkipReason, UnattemptedReason,
};
use tacit::infrastructure::artifacts::{ArtifactWriter, RunMeta, META_FILE, SUMMARY_FILE, TRACES_FILE};
use tacit::infrastructure::browser::{
    Effect, LoadingEffect, ScriptedInteraction, ScriptedPage, SiteModel,
};
use tacit::{Expectation, FinalVerdict, TruthState, VerdictStatus};

#[tokio::test(start_paused = true)]
async fn test_clean_site_is_ready() {
    let report = scan(clean_site(), &working_expectations()).await;

    assert_eq!(report.frontier.pages_visited, 2);
    assert_eq!(verdict_status(&report, "nav-about"), Some(VerdictStatus::Observed));
    assert_eq!(verdict_status(&report, "save-toast"), Some(VerdictStatus::Observed));
    assert_eq!(report.summary.attempted, 2);
    assert_eq!(report.summary.coverage_ratio, 1.0);
    assert_eq!(report.truth.truth_state, TruthState::Success);
    assert_eq!(report.decision.verdict, FinalVerdict::Ready);
    assert_eq!(report.decision.exit_code, 0);
}

#[tokio::test(start_paused = true)]
async fn test_silent_button_is_a_confirmed_finding() {
    let mut expectations = working_expectations();
    expectations.push(Expectation::new("subscribe", "submit").with_selector("#subscribe"));

    let report = scan(silent_site(), &expectations).await;

    let verdict = report
        .verdicts
        .iter()
        .find(|v| v.expectation_id.as_deref() == Some("subscribe"))
        .expect("verdict for subscribe");
    assert_eq!(verdict.status, VerdictStatus::Confirmed);
    assert_eq!(verdict.failure_class, Some(FailureClass::SubmitSilentFailure));
    assert_eq!(verdict.confidence, 1.0);
    assert!(verdict.rationale_signals.contains(&"runComplete=true".to_string()));

    assert_eq!(report.summary.silent_failures, 1);
    assert_eq!(report.truth.truth_state, TruthState::Findings);
    assert_eq!(report.decision.verdict, FinalVerdict::Fail);
    assert_eq!(report.decision.exit_code, 20);

    let trace = report
        .traces
        .iter()
        .find(|t| t.interaction.selector == "#subscribe")
        .expect("trace for subscribe");
    assert!(trace.verdict.is_some());
    assert_eq!(trace.before, trace.after);
}

#[tokio::test(start_paused = true)]
async fn test_financial_action_is_withheld() {
    let mut expectations = working_expectations();
    expectations.push(Expectation::new("pay", "submit").with_selector("#pay"));

    let report = scan(clean_site(), &expectations).await;

    assert_eq!(verdict_status(&report, "pay"), Some(VerdictStatus::CoverageGap));
    assert_eq!(
        report.summary.unattempted_breakdown.get("safety_skipped"),
        Some(&1)
    );
    let skipped = report
        .traces
        .iter()
        .find(|t| t.interaction.selector == "#pay")
        .and_then(|t| t.skipped.clone())
        .expect("pay is recorded as skipped");
    assert!(skipped.skip);
    assert_eq!(skipped.reason, Some(SkipReason::Financial));
    // 2 of 3 attempted stays below the coverage threshold
    assert_eq!(report.truth.truth_state, TruthState::Incomplete);
}

#[tokio::test(start_paused = true)]
async fn test_unvisited_route_is_incomplete() {
    let expectations = vec![Expectation::new("settings-save", "submit")
        .with_route("/settings")
        .with_selector("#save-settings")];

    let report = scan(clean_site(), &expectations).await;

    let observation = &report.observations[0];
    assert!(!observation.attempted);
    assert_eq!(
        observation.unattempted_reason,
        Some(UnattemptedReason::RouteNotVisited)
    );
    assert_eq!(report.truth.truth_state, TruthState::Incomplete);
    assert!(report.truth.safety_statement.is_some());
    assert_eq!(report.decision.verdict, FinalVerdict::Concern);
    assert_eq!(report.decision.exit_code, 30);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_start_page_is_infrastructure_failure() {
    let site = SiteModel::new(vec![ScriptedPage {
        navigation_error: Some("connection refused".to_string()),
        ..ScriptedPage::new(START)
    }]);

    let report = scan(site, &working_expectations()).await;

    assert!(report.summary.infrastructure_failure);
    assert_eq!(report.frontier.pages_visited, 1);
    assert!(report.traces.is_empty());
    assert_eq!(report.truth.truth_state, TruthState::Incomplete);
    assert_eq!(report.decision.exit_code, 30);
}

#[tokio::test(start_paused = true)]
async fn test_phantom_loading_is_confirmed() {
    let expectations = vec![Expectation::new("refresh", "loading").with_selector("#refresh")];

    let report = scan(phantom_loading_site(), &expectations).await;

    let verdict = &report.verdicts[0];
    assert_eq!(verdict.status, VerdictStatus::Confirmed);
    assert_eq!(verdict.failure_class, Some(FailureClass::LoadingPhantomFailure));
    assert!(verdict.rationale_signals.contains(&"loadingStarted=true".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_resolving_spinner_is_observed() {
    let home = ScriptedPage::new(START).with_interaction(button("#refresh", "Refresh").with_effect(
        Effect {
            loading: Some(LoadingEffect {
                indicators: 1,
                resolve_after_ms: Some(100),
            }),
            ..Default::default()
        },
    ));
    let expectations = vec![Expectation::new("refresh", "loading").with_selector("#refresh")];

    let report = scan(SiteModel::new(vec![home]), &expectations).await;

    assert_eq!(verdict_status(&report, "refresh"), Some(VerdictStatus::Observed));
    assert!(report.observations[0].observed);
}

#[tokio::test(start_paused = true)]
async fn test_form_submission_retries_driver_errors() {
    let home = ScriptedPage::new(START).with_interaction(
        ScriptedInteraction::new(
            InteractionDescriptor::new(InteractionKind::Form, "#signup").with_field("#email", "a@b.test"),
        )
        .with_effect(Effect::dom("welcome"))
        .failing(1),
    );
    let expectations = vec![Expectation::new("signup", "submit").with_selector("#signup")];

    let report = scan(SiteModel::new(vec![home]), &expectations).await;

    assert_eq!(verdict_status(&report, "signup"), Some(VerdictStatus::Observed));
    assert_eq!(
        report.determinism_factors.get(&DeterminismFactor::RetryUsed),
        Some(&1)
    );
}

#[tokio::test(start_paused = true)]
async fn test_button_errors_are_not_retried() {
    let home = ScriptedPage::new(START).with_interaction(button("#broken", "Open").failing(1));
    let expectations = vec![Expectation::new("broken", "feedback").with_selector("#broken")];

    let report = scan(SiteModel::new(vec![home]), &expectations).await;

    assert_eq!(
        report.observations[0].unattempted_reason,
        Some(UnattemptedReason::InteractionFailed)
    );
    assert!(report.traces[0].failure.is_some());
    assert!(!report.determinism_factors.contains_key(&DeterminismFactor::RetryUsed));
}

#[tokio::test(start_paused = true)]
async fn test_hung_interaction_is_only_suspected() {
    let home = ScriptedPage::new(START)
        .with_interaction(button("#slow", "Send").with_effect(Effect::default().with_hang_ms(60_000)));
    let expectations = vec![Expectation::new("slow", "submit").with_selector("#slow")];

    let report = scan(SiteModel::new(vec![home]), &expectations).await;

    let observation = &report.observations[0];
    assert!(observation.attempted);
    assert_eq!(observation.run_complete, Some(false));
    assert_eq!(verdict_status(&report, "slow"), Some(VerdictStatus::Suspected));
    assert!(observation.silence_detected.is_some());
    assert!(report.summary.is_incomplete);
    assert_eq!(report.truth.truth_state, TruthState::Incomplete);
    assert!(report
        .determinism_factors
        .contains_key(&DeterminismFactor::TimeoutRisk));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_scans_are_identical() {
    let mut expectations = working_expectations();
    expectations.push(Expectation::new("subscribe", "submit").with_selector("#subscribe"));

    let first = scan(silent_site(), &expectations).await;
    let second = scan(silent_site(), &expectations).await;

    assert_eq!(first.verdicts, second.verdicts);
    assert_eq!(
        serde_json::to_value(&first.traces).unwrap(),
        serde_json::to_value(&second.traces).unwrap()
    );
    assert_eq!(first.decision, second.decision);
}

#[tokio::test(start_paused = true)]
async fn test_artifacts_written_per_run() {
    let report = scan(clean_site(), &working_expectations()).await;
    let out = tempfile::tempdir().unwrap();
    let meta = RunMeta::new(BudgetProfile::Quick, "scripted", Utc::now()).finish(Utc::now());

    let written = ArtifactWriter::new(out.path()).write(&report, &meta).await.unwrap();

    assert_eq!(written.dir, out.path().join(meta.run_id.to_string()));
    assert_eq!(written.traces, written.dir.join(TRACES_FILE));

    let traces = std::fs::read_to_string(&written.traces).unwrap();
    assert_eq!(traces.lines().count(), report.traces.len());

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(written.dir.join(SUMMARY_FILE)).unwrap()).unwrap();
    assert_eq!(summary["startUrl"], START);
    assert_eq!(summary["decision"]["verdict"], "READY");
    assert_eq!(
        summary["verdicts"].as_array().map(Vec::len),
        Some(report.verdicts.len())
    );

    let meta_json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(written.dir.join(META_FILE)).unwrap()).unwrap();
    assert_eq!(meta_json["runId"], meta.run_id.to_string());
    assert_eq!(meta_json["driver"], "scripted");
}
