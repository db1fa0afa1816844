//! Interaction driver.
//!
//! Executes one interaction at a time against a [`PageDriver`]: snapshot,
//! act, settle, snapshot again, then derive evidence signals from the
//! before/after comparison and the events drained while settling.
//!
//! Every browser call runs under an explicit deadline. Expiry is a normal
//! outcome: the interaction is still evaluated, with `run_complete = false`.
//! Driver errors are converted into a [`StepFailure`] record and never
//! abort the run.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::domain::errors::DriverError;
use crate::domain::models::{
    ActivityLog, AttemptProof, DomDiff, EvidenceArtifacts, EvidenceSignals, InteractionDescriptor,
    InteractionKind, NetworkEvidence, Observation, PageSnapshot, PageState, ScanBudget,
    SettleOutcome, SignalKind, StateComparison, StepFailure, UnattemptedReason,
};
use crate::domain::ports::PageDriver;
use crate::services::stabilization::StabilizationEngine;

/// Order interactions links, buttons, forms, then everything else; stable by
/// selector within each group; sliced to `cap`.
pub fn prioritize(mut interactions: Vec<InteractionDescriptor>, cap: usize) -> Vec<InteractionDescriptor> {
    interactions.sort_by(|a, b| {
        a.kind
            .priority_rank()
            .cmp(&b.kind.priority_rank())
            .then_with(|| a.selector.cmp(&b.selector))
    });
    interactions.truncate(cap);
    interactions
}

/// Everything captured for one executed interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionOutcome {
    pub interaction: InteractionDescriptor,
    /// The action was dispatched (possibly timing out while doing so).
    pub attempted: bool,
    pub before: Option<PageSnapshot>,
    pub after: Option<PageSnapshot>,
    pub settle: Option<SettleOutcome>,
    pub signals: EvidenceSignals,
    pub artifacts: EvidenceArtifacts,
    pub failure: Option<StepFailure>,
    pub timed_out: bool,
    pub retries_used: u32,
}

impl InteractionOutcome {
    fn new(interaction: &InteractionDescriptor) -> Self {
        Self {
            interaction: interaction.clone(),
            attempted: false,
            before: None,
            after: None,
            settle: None,
            signals: EvidenceSignals::new(),
            artifacts: EvidenceArtifacts::default(),
            failure: None,
            timed_out: false,
            retries_used: 0,
        }
    }

    /// Whether the full settle window elapsed without any timeout.
    pub fn run_complete(&self) -> bool {
        !self.timed_out && self.settle.as_ref().is_some_and(SettleOutcome::is_complete)
    }

    /// Observation of this interaction on behalf of one expectation.
    pub fn observation(&self, expectation_id: &str, observed: bool) -> Observation {
        if !self.attempted {
            return Observation::unattempted(expectation_id, UnattemptedReason::InteractionFailed);
        }
        Observation {
            expectation_id: Some(expectation_id.to_string()),
            attempted: true,
            observed,
            run_complete: Some(self.run_complete()),
            attempt_proof: Some(AttemptProof {
                action: self.interaction.kind,
                selector: self.interaction.selector.clone(),
            }),
            evidence_signals: self.signals.clone(),
            artifacts: self.artifacts.clone(),
            unattempted_reason: None,
            silence_detected: None,
        }
    }
}

enum Bounded<T> {
    Done(T),
    Failed(DriverError),
    TimedOut,
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, DriverError>>,
) -> Bounded<T> {
    match timeout(limit, call).await {
        Ok(Ok(value)) => Bounded::Done(value),
        Ok(Err(err)) => Bounded::Failed(err),
        Err(_) => Bounded::TimedOut,
    }
}

/// Executes interactions on one page, sequentially.
pub struct InteractionDriver {
    page: Arc<dyn PageDriver>,
    budget: ScanBudget,
    stabilizer: StabilizationEngine,
}

impl InteractionDriver {
    pub fn new(page: Arc<dyn PageDriver>, budget: &ScanBudget) -> Self {
        Self {
            page,
            stabilizer: StabilizationEngine::new(budget),
            budget: budget.clone(),
        }
    }

    /// Execute `interaction` and collect its evidence.
    #[instrument(skip_all, fields(kind = %interaction.kind, selector = %interaction.selector))]
    pub async fn execute(&self, interaction: &InteractionDescriptor) -> InteractionOutcome {
        let limit = self.budget.interaction_timeout();
        let mut outcome = InteractionOutcome::new(interaction);

        let before = match bounded(limit, self.page.snapshot()).await {
            Bounded::Done(snapshot) => snapshot,
            Bounded::Failed(err) => {
                outcome.failure = Some(failure(&err));
                return outcome;
            }
            Bounded::TimedOut => {
                outcome.timed_out = true;
                outcome.failure = Some(timeout_failure("before snapshot"));
                return outcome;
            }
        };

        // Subscribe before acting so no effect of the action is missed.
        let mut events = self.page.subscribe();

        match self.perform_with_retries(interaction, limit, &mut outcome).await {
            Bounded::Done(()) => outcome.attempted = true,
            Bounded::TimedOut => {
                warn!("interaction timed out");
                outcome.attempted = true;
                outcome.timed_out = true;
            }
            Bounded::Failed(err) => {
                debug!(error = %err, "interaction failed");
                outcome.failure = Some(failure(&err));
                outcome.before = Some(before);
                return outcome;
            }
        }

        let mid_delay = Duration::from_millis(self.budget.stabilization_sample_mid_ms);
        let (settle, mid) = tokio::join!(self.stabilizer.settle(self.page.as_ref(), &mut events), async {
            sleep(mid_delay).await;
            match bounded(limit, self.page.snapshot()).await {
                Bounded::Done(snapshot) => Some(snapshot),
                _ => None,
            }
        });

        let after = match bounded(limit, self.page.snapshot()).await {
            Bounded::Done(snapshot) => Some(snapshot),
            Bounded::Failed(err) => {
                outcome.failure = Some(failure(&err));
                None
            }
            Bounded::TimedOut => {
                outcome.timed_out = true;
                None
            }
        };

        if let Some(after) = &after {
            outcome.signals = derive_signals(&before, mid.as_ref(), after, &settle.activity);
            outcome.artifacts = artifacts(&before, after, &settle.activity);
        }
        outcome.before = Some(before);
        outcome.after = after;
        outcome.settle = Some(settle);

        debug!(
            signals = ?outcome.signals.true_signals(),
            run_complete = outcome.run_complete(),
            "interaction evaluated"
        );
        outcome
    }

    /// Form submission retries on driver errors only, never on timeout.
    async fn perform_with_retries(
        &self,
        interaction: &InteractionDescriptor,
        limit: Duration,
        outcome: &mut InteractionOutcome,
    ) -> Bounded<()> {
        let max_retries = if interaction.kind.submits_form() {
            self.budget.max_retries_per_interaction
        } else {
            0
        };
        let mut attempt = 0;
        loop {
            match bounded(limit, self.perform(interaction)).await {
                Bounded::Failed(err) if attempt < max_retries => {
                    attempt += 1;
                    outcome.retries_used = attempt;
                    debug!(attempt, error = %err, "retrying form submission");
                }
                result => return result,
            }
        }
    }

    async fn perform(&self, interaction: &InteractionDescriptor) -> Result<(), DriverError> {
        let page = self.page.as_ref();
        let selector = interaction.selector.as_str();
        match interaction.kind {
            InteractionKind::Link | InteractionKind::Button | InteractionKind::Logout => {
                page.click(selector).await
            }
            InteractionKind::Form | InteractionKind::Login => {
                for field in &interaction.fields {
                    page.fill(&field.selector, &field.value).await?;
                }
                match &interaction.submit_selector {
                    Some(submit) => page.click(submit).await,
                    None => page.press(selector, "Enter").await,
                }
            }
            InteractionKind::Hover => page.hover(selector).await,
            InteractionKind::Keyboard => {
                page.focus(selector).await?;
                page.press(selector, interaction.key.as_deref().unwrap_or("Enter"))
                    .await
            }
            InteractionKind::FileUpload => {
                let files: Vec<PathBuf> = interaction.files.iter().map(PathBuf::from).collect();
                page.set_input_files(selector, &files).await
            }
        }
    }
}

fn failure(err: &DriverError) -> StepFailure {
    StepFailure {
        finding_type: err.finding_type().to_string(),
        message: err.to_string(),
    }
}

fn timeout_failure(stage: &str) -> StepFailure {
    StepFailure {
        finding_type: "timeout".to_string(),
        message: format!("{stage} exceeded the interaction timeout"),
    }
}

/// Split a URL into (document, route) parts: the document excludes the
/// fragment, the route is path plus fragment.
fn url_parts(raw: &str) -> (String, String) {
    match Url::parse(raw) {
        Ok(mut url) => {
            let route = format!("{}#{}", url.path(), url.fragment().unwrap_or_default());
            url.set_fragment(None);
            (url.to_string(), route)
        }
        Err(_) => (raw.to_string(), raw.to_string()),
    }
}

/// Evidence signals from a before/after comparison. Every signal is set
/// explicitly, since all of them were measured.
pub fn derive_signals(
    before: &PageSnapshot,
    mid: Option<&PageSnapshot>,
    after: &PageSnapshot,
    activity: &ActivityLog,
) -> EvidenceSignals {
    let (before_doc, before_route) = url_parts(&before.url);
    let (after_doc, after_route) = url_parts(&after.url);
    let fb_before = &before.feedback;
    let fb_after = &after.feedback;

    let loading_peak = mid
        .map_or(0, |m| m.feedback.loading_indicators)
        .max(fb_after.loading_indicators);
    let loading_started = loading_peak > fb_before.loading_indicators;
    let loading_resolved = loading_started && fb_after.loading_indicators <= fb_before.loading_indicators;
    let silent_block = activity.statuses.iter().any(|s| matches!(s, 401 | 403));

    EvidenceSignals::new()
        .with(SignalKind::NavigationChanged, before_doc != after_doc)
        .with(SignalKind::RouteChanged, before_route != after_route)
        .with(
            SignalKind::MeaningfulDomChange,
            before.dom_fingerprint != after.dom_fingerprint,
        )
        .with(
            SignalKind::FeedbackSeen,
            fb_after.toasts > fb_before.toasts || fb_after.validation_messages > fb_before.validation_messages,
        )
        .with(
            SignalKind::AriaLiveUpdated,
            fb_after.aria_live_text != fb_before.aria_live_text
                && fb_after.aria_live_text.iter().any(|t| !t.trim().is_empty()),
        )
        .with(
            SignalKind::AriaRoleAlertsDetected,
            fb_after.role_alerts > fb_before.role_alerts,
        )
        .with(SignalKind::NetworkActivity, activity.has_network())
        .with(SignalKind::LoadingStarted, loading_started)
        .with(SignalKind::LoadingResolved, loading_resolved)
        .with(SignalKind::StateChanged, before.storage != after.storage)
        .with(SignalKind::SilentBlock, silent_block)
        .with(
            SignalKind::ValidationFeedback,
            fb_after.validation_messages > fb_before.validation_messages,
        )
}

fn artifacts(before: &PageSnapshot, after: &PageSnapshot, activity: &ActivityLog) -> EvidenceArtifacts {
    let state = |s: &PageSnapshot| PageState {
        url: s.url.clone(),
        dom_fingerprint: s.dom_fingerprint.clone(),
    };
    EvidenceArtifacts {
        before_after: Some(StateComparison {
            before: state(before),
            after: state(after),
        }),
        dom_diff: Some(DomDiff {
            changed: before.dom_fingerprint != after.dom_fingerprint,
            element_delta: i64::from(after.element_count) - i64::from(before.element_count),
        }),
        network: activity.has_network().then(|| NetworkEvidence {
            requests: activity.requests,
            failed: activity.failed_requests,
            statuses: activity.statuses.clone(),
        }),
    }
}
