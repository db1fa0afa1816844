//! Scan orchestrator.
//!
//! Runs one scan end to end: frontier, navigation, discovery, allocation,
//! safety gate, interaction, classification, then run truth and decision.
//! Pages and interactions are processed strictly one at a time so that each
//! before/after window belongs to exactly one interaction.
//!
//! Declared flows run after the crawl, each from its own start page, capped
//! by `max_flows` and `max_flow_steps`. A malformed step is rejected on its
//! own. A failed step stops all remaining flows unless its failure mode is
//! `continue`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tokio::time::timeout;
use tracing::{info, instrument, warn};
use url::Url;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Config, DeterminismFactor, Expectation, FailureMode, Flow, FlowStep, InteractionDescriptor,
    Observation, PageSnapshot, PageState, RunSummary, ScanBudget, ScanReport, SkipDecision,
    StepFailure, TraceRecord, UnattemptedReason, Verdict,
};
use crate::domain::ports::PageDriver;
use crate::services::budget_engine::BudgetEngine;
use crate::services::decision_authority::DecisionAuthority;
use crate::services::frontier::CrawlFrontier;
use crate::services::interaction_driver::{prioritize, InteractionDriver, InteractionOutcome};
use crate::services::safety_gate::SafetyGate;
use crate::services::silent_failure::{self, disconfirming_signals};
use crate::services::stabilization::StabilizationEngine;
use crate::services::truth_classifier;

/// Mutable bookkeeping for one run. Owned by [`ScanOrchestrator::run`].
#[derive(Default)]
struct RunState {
    traces: Vec<TraceRecord>,
    /// Attempted observations, keyed by expectation id. First attempt wins.
    attempted: HashMap<String, Observation>,
    /// Latest known reason for expectations not yet attempted.
    pending: HashMap<String, UnattemptedReason>,
    factors: BTreeMap<DeterminismFactor, u32>,
    infrastructure_failure: bool,
    /// Flow step whose failure stopped the remaining flows.
    flow_aborted: Option<String>,
    sequence: u32,
}

impl RunState {
    fn factor(&mut self, factor: DeterminismFactor) {
        *self.factors.entry(factor).or_insert(0) += 1;
    }

    fn defer(&mut self, id: &str, reason: UnattemptedReason) {
        if !self.attempted.contains_key(id) {
            self.pending.insert(id.to_string(), reason);
        }
    }

    /// Record `reason` unless a more specific one is already known.
    fn defer_default(&mut self, id: &str, reason: UnattemptedReason) {
        if !self.attempted.contains_key(id) {
            self.pending.entry(id.to_string()).or_insert(reason);
        }
    }

    fn next_sequence(&mut self) -> u32 {
        self.sequence += 1;
        self.sequence
    }
}

/// Drives a full scan against one page driver.
pub struct ScanOrchestrator {
    page: Arc<dyn PageDriver>,
    budget: ScanBudget,
    config: Config,
    gate: SafetyGate,
}

impl ScanOrchestrator {
    pub fn new(page: Arc<dyn PageDriver>, budget: ScanBudget, config: Config) -> Self {
        Self {
            page,
            budget,
            config,
            gate: SafetyGate::new(),
        }
    }

    /// Scan from `start_url` and classify `expectations`.
    pub async fn run(&self, start_url: &str, expectations: &[Expectation]) -> DomainResult<ScanReport> {
        self.run_with_flows(start_url, expectations, &[]).await
    }

    /// Scan from `start_url`, run `flows`, and classify `expectations`.
    ///
    /// Fails only on invalid input. Browser failures become infrastructure
    /// failures or per-step records inside the report.
    #[instrument(skip_all, fields(start_url = %start_url, driver = self.page.name(), flows = flows.len()))]
    pub async fn run_with_flows(
        &self,
        start_url: &str,
        expectations: &[Expectation],
        flows: &[Flow],
    ) -> DomainResult<ScanReport> {
        let mut frontier = CrawlFrontier::new(
            start_url,
            &self.budget,
            &self.config.frontier.extra_tracking_params,
        )?;
        let flow_urls = flows
            .iter()
            .map(|flow| flow_start_url(start_url, flow, &frontier))
            .collect::<DomainResult<Vec<String>>>()?;
        let allocator = BudgetEngine::new(&self.config.allocation, &self.budget);
        let driver = InteractionDriver::new(Arc::clone(&self.page), &self.budget);
        let stabilizer = StabilizationEngine::new(&self.budget);
        let start = frontier.canonicalize(start_url)?;
        let route_total = declared_route_count(&start, expectations, &frontier);
        let mut state = RunState::default();

        if stabilizer.is_adaptive() {
            state.factor(DeterminismFactor::AdaptiveStabilization);
        }
        info!(expectations = expectations.len(), "scan started");

        let mut first_page = true;
        while let Some(url) = frontier.next() {
            let loaded = self.load_page(&url, &stabilizer, &mut state).await;
            if !loaded {
                if first_page {
                    warn!(url = %url, "start page failed to load");
                    state.infrastructure_failure = true;
                    break;
                }
                continue;
            }
            first_page = false;

            self.discover_links(&url, &mut frontier).await;
            self.scan_page(
                &url,
                expectations,
                route_total,
                &frontier,
                &allocator,
                &driver,
                &stabilizer,
                &mut state,
            )
            .await;
        }

        if !state.infrastructure_failure {
            let flows: Vec<(&Flow, &str)> = flows
                .iter()
                .zip(flow_urls.iter().map(String::as_str))
                .collect();
            self.run_flows(&flows, expectations, &frontier, &driver, &stabilizer, &mut state)
                .await;
        }

        Ok(self.finish(start, expectations, &frontier, state))
    }

    async fn load_page(&self, url: &str, stabilizer: &StabilizationEngine, state: &mut RunState) -> bool {
        let mut events = self.page.subscribe();
        match timeout(self.budget.navigation_timeout(), self.page.goto(url)).await {
            Ok(Ok(response)) => {
                if let Some(status) = response.status.filter(|s| *s >= 400) {
                    warn!(url, status, "page responded with error status");
                }
            }
            Ok(Err(err)) => {
                warn!(url, error = %err, "navigation failed");
                return false;
            }
            Err(_) => {
                warn!(url, "navigation timed out");
                state.factor(DeterminismFactor::TimeoutRisk);
                return false;
            }
        }
        let settle = stabilizer.settle(self.page.as_ref(), &mut events).await;
        if settle.timed_out {
            state.factor(DeterminismFactor::TimeoutRisk);
        }
        true
    }

    async fn discover_links(&self, url: &str, frontier: &mut CrawlFrontier) {
        match timeout(self.budget.interaction_timeout(), self.page.discover_links()).await {
            Ok(Ok(links)) => {
                for href in links {
                    frontier.add_relative(url, &href);
                }
            }
            Ok(Err(err)) => warn!(url, error = %err, "link discovery failed"),
            Err(_) => warn!(url, "link discovery timed out"),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn scan_page(
        &self,
        url: &str,
        expectations: &[Expectation],
        route_total: usize,
        frontier: &CrawlFrontier,
        allocator: &BudgetEngine,
        driver: &InteractionDriver,
        stabilizer: &StabilizationEngine,
        state: &mut RunState,
    ) {
        let discovered = match timeout(
            self.budget.interaction_timeout(),
            self.page.discover_interactions(),
        )
        .await
        {
            Ok(Ok(found)) => found,
            Ok(Err(err)) => {
                warn!(url, error = %err, "interaction discovery failed");
                Vec::new()
            }
            Err(_) => {
                state.factor(DeterminismFactor::TimeoutRisk);
                Vec::new()
            }
        };

        let on_page: Vec<Expectation> = expectations
            .iter()
            .filter(|e| route_matches(e.route.as_deref(), url, frontier))
            .cloned()
            .collect();
        for expectation in &on_page {
            state.defer_default(&expectation.id, UnattemptedReason::SelectorNotFound);
        }

        let allocation = allocator.allocate(url, &on_page, route_total);
        let page_budget = self.budget.with_interaction_cap(allocation.budget);
        let mut ordered = prioritize(discovered, usize::MAX);
        let deferred =
            ordered.split_off((page_budget.max_interactions_per_page as usize).min(ordered.len()));
        info!(
            url,
            budget = page_budget.max_interactions_per_page,
            interactions = ordered.len(),
            deferred = deferred.len(),
            "scanning page"
        );

        let mut remaining = ordered.into_iter();
        let mut leftover = UnattemptedReason::TimeExhausted;
        for interaction in remaining.by_ref() {
            if frontier.elapsed() >= self.budget.max_scan_duration() {
                self.defer_all(&interaction, &on_page, UnattemptedReason::TimeExhausted, state);
                break;
            }
            let bound = bind(&interaction, &on_page);

            let skip = self.gate.should_skip(&interaction);
            if skip.skip {
                for expectation in &bound {
                    state.defer(&expectation.id, UnattemptedReason::SafetySkipped);
                }
                self.record_skip(url, interaction, skip, None, state);
                continue;
            }

            let outcome = driver.execute(&interaction).await;
            if outcome.timed_out {
                state.factor(DeterminismFactor::TimeoutRisk);
            }
            if outcome.retries_used > 0 {
                state.factor(DeterminismFactor::RetryUsed);
            }
            self.record_outcome(url, outcome.clone(), &bound, None, state);

            // Restore the page before the next interaction if this one left it.
            let left_page = outcome
                .after
                .as_ref()
                .is_some_and(|after| frontier.canonicalize(&after.url).ok().as_deref() != Some(url));
            if left_page && !self.load_page(url, stabilizer, state).await {
                warn!(url, "could not return to page; abandoning remaining interactions");
                leftover = UnattemptedReason::InteractionFailed;
                break;
            }
        }

        for interaction in remaining {
            self.defer_all(&interaction, &on_page, leftover, state);
        }
        for interaction in &deferred {
            self.defer_all(interaction, &on_page, UnattemptedReason::BudgetExhausted, state);
        }
    }

    async fn run_flows(
        &self,
        flows: &[(&Flow, &str)],
        expectations: &[Expectation],
        frontier: &CrawlFrontier,
        driver: &InteractionDriver,
        stabilizer: &StabilizationEngine,
        state: &mut RunState,
    ) {
        let known: HashSet<&str> = expectations.iter().map(|e| e.id.as_str()).collect();
        for (index, (flow, url)) in flows.iter().enumerate() {
            let withheld = if state.flow_aborted.is_some() {
                Some(UnattemptedReason::FlowAborted)
            } else if frontier.elapsed() >= self.budget.max_scan_duration() {
                Some(UnattemptedReason::TimeExhausted)
            } else if index >= self.budget.max_flows as usize {
                Some(UnattemptedReason::BudgetExhausted)
            } else {
                None
            };
            if let Some(reason) = withheld {
                info!(flow = %flow.id, reason = reason.as_str(), "flow not run");
                defer_steps(&flow.steps, reason, state);
                continue;
            }
            self.run_flow(flow, url, &known, expectations, frontier, driver, stabilizer, state)
                .await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_flow(
        &self,
        flow: &Flow,
        url: &str,
        known: &HashSet<&str>,
        expectations: &[Expectation],
        frontier: &CrawlFrontier,
        driver: &InteractionDriver,
        stabilizer: &StabilizationEngine,
        state: &mut RunState,
    ) {
        info!(flow = %flow.id, url, steps = flow.steps.len(), "running flow");
        if !self.load_page(url, stabilizer, state).await {
            warn!(flow = %flow.id, url, "flow start page failed to load");
            defer_steps(&flow.steps, UnattemptedReason::InteractionFailed, state);
            return;
        }

        let cap = (self.budget.max_flow_steps as usize).min(flow.steps.len());
        let (runnable, over_cap) = flow.steps.split_at(cap);
        defer_steps(over_cap, UnattemptedReason::BudgetExhausted, state);

        for (index, step) in runnable.iter().enumerate() {
            let label = format!("{}#{}", flow.id, index + 1);
            let rest = &runnable[index..];
            if frontier.elapsed() >= self.budget.max_scan_duration() {
                defer_steps(rest, UnattemptedReason::TimeExhausted, state);
                return;
            }
            let bound: Vec<&Expectation> = step
                .expectation
                .as_deref()
                .and_then(|id| expectations.iter().find(|e| e.id == id))
                .into_iter()
                .collect();
            let interaction = step.interaction();

            if let Err(err) = step.validate(known) {
                warn!(step = %label, error = %err, "invalid flow step skipped");
                defer_steps(std::slice::from_ref(step), UnattemptedReason::ValidationFailed, state);
                let failure = StepFailure {
                    finding_type: "validation_error".to_string(),
                    message: err.to_string(),
                };
                self.record_failure(url, interaction, failure, label, state);
                continue;
            }

            let skip = self.gate.should_skip(&interaction);
            if skip.skip {
                defer_steps(std::slice::from_ref(step), UnattemptedReason::SafetySkipped, state);
                self.record_skip(url, interaction, skip, Some(label), state);
                continue;
            }

            let outcome = driver.execute(&interaction).await;
            if outcome.timed_out {
                state.factor(DeterminismFactor::TimeoutRisk);
            }
            if outcome.retries_used > 0 {
                state.factor(DeterminismFactor::RetryUsed);
            }
            let failed = !outcome.attempted || outcome.failure.is_some();
            let page_url = outcome
                .before
                .as_ref()
                .map_or_else(|| url.to_string(), |s| s.url.clone());
            self.record_outcome(&page_url, outcome, &bound, Some(label.clone()), state);

            if failed {
                warn!(
                    step = %label,
                    failure_mode = step.failure_mode.as_str(),
                    "flow step failed"
                );
                if step.failure_mode == FailureMode::Abort {
                    defer_steps(&rest[1..], UnattemptedReason::FlowAborted, state);
                    state.flow_aborted = Some(label);
                    return;
                }
            }
        }
    }

    fn record_failure(
        &self,
        url: &str,
        interaction: InteractionDescriptor,
        failure: StepFailure,
        flow_step: String,
        state: &mut RunState,
    ) {
        let sequence = state.next_sequence();
        state.traces.push(TraceRecord {
            sequence,
            page_url: url.to_string(),
            flow_step: Some(flow_step),
            interaction,
            before: None,
            after: None,
            evidence_signals: Default::default(),
            settle: None,
            skipped: None,
            failure: Some(failure),
            verdict: None,
        });
    }

    fn defer_all(
        &self,
        interaction: &InteractionDescriptor,
        on_page: &[Expectation],
        reason: UnattemptedReason,
        state: &mut RunState,
    ) {
        for expectation in bind(interaction, on_page) {
            state.defer(&expectation.id, reason);
        }
    }

    fn record_skip(
        &self,
        url: &str,
        interaction: InteractionDescriptor,
        skip: SkipDecision,
        flow_step: Option<String>,
        state: &mut RunState,
    ) {
        let sequence = state.next_sequence();
        state.traces.push(TraceRecord {
            sequence,
            page_url: url.to_string(),
            flow_step,
            interaction,
            before: None,
            after: None,
            evidence_signals: Default::default(),
            settle: None,
            skipped: Some(skip),
            failure: None,
            verdict: None,
        });
    }

    fn record_outcome(
        &self,
        url: &str,
        outcome: InteractionOutcome,
        bound: &[&Expectation],
        flow_step: Option<String>,
        state: &mut RunState,
    ) {
        let mut trace_verdict = None;
        for expectation in bound {
            if state.attempted.contains_key(&expectation.id) {
                continue;
            }
            if !outcome.attempted {
                state.defer(&expectation.id, UnattemptedReason::InteractionFailed);
                continue;
            }
            let observed = expectation.promise_kind().is_some_and(|kind| {
                disconfirming_signals(kind)
                    .iter()
                    .any(|s| outcome.signals.is_true(*s))
            });
            let mut observation = outcome.observation(&expectation.id, observed);
            let verdict = silent_failure::classify(
                expectation,
                &observation,
                &observation.evidence_signals,
                observation.is_run_complete(),
            );
            if let Some(record) = verdict.as_ref().and_then(silent_failure::silence_record) {
                observation.attach_silence(record);
            }
            if trace_verdict.is_none() {
                trace_verdict.clone_from(&verdict);
            }
            state.pending.remove(&expectation.id);
            state.attempted.insert(expectation.id.clone(), observation);
        }

        let state_of = |s: &PageSnapshot| PageState {
            url: s.url.clone(),
            dom_fingerprint: s.dom_fingerprint.clone(),
        };
        let sequence = state.next_sequence();
        state.traces.push(TraceRecord {
            sequence,
            page_url: url.to_string(),
            flow_step,
            before: outcome.before.as_ref().map(state_of),
            after: outcome.after.as_ref().map(state_of),
            evidence_signals: outcome.signals,
            settle: outcome.settle,
            skipped: None,
            failure: outcome.failure,
            verdict: trace_verdict,
            interaction: outcome.interaction,
        });
    }

    fn finish(
        &self,
        start_url: String,
        expectations: &[Expectation],
        frontier: &CrawlFrontier,
        mut state: RunState,
    ) -> ScanReport {
        let time_exhausted = frontier.is_time_exhausted()
            || state.pending.values().any(|r| *r == UnattemptedReason::TimeExhausted);

        let mut observations = Vec::with_capacity(expectations.len());
        let mut verdicts: Vec<Verdict> = Vec::new();
        for expectation in expectations {
            let observation = match state.attempted.remove(&expectation.id) {
                Some(observation) => observation,
                None => {
                    let reason = state.pending.get(&expectation.id).copied().unwrap_or(
                        if time_exhausted {
                            UnattemptedReason::TimeExhausted
                        } else {
                            UnattemptedReason::RouteNotVisited
                        },
                    );
                    Observation::unattempted(&expectation.id, reason)
                }
            };
            if let Some(verdict) = silent_failure::classify(
                expectation,
                &observation,
                &observation.evidence_signals,
                observation.is_run_complete(),
            ) {
                verdicts.push(verdict);
            }
            observations.push(observation);
        }

        let mut summary = RunSummary::from_verdicts(
            expectations,
            &observations,
            &verdicts,
            state.infrastructure_failure,
        );
        if time_exhausted {
            summary.is_incomplete = true;
            *summary
                .incomplete_reasons
                .entry("scan_time_exhausted".to_string())
                .or_insert(0) += 1;
            state.factor(DeterminismFactor::ScanTimeExhausted);
        }
        if let Some(step) = &state.flow_aborted {
            info!(step = %step, "flows aborted");
            summary.is_incomplete = true;
            *summary
                .incomplete_reasons
                .entry("flow_aborted".to_string())
                .or_insert(0) += 1;
        }
        if frontier.is_capped() {
            *summary
                .incomplete_reasons
                .entry("frontier_capped".to_string())
                .or_insert(0) += 1;
            state.factor(DeterminismFactor::FrontierCapped);
        }

        let truth = truth_classifier::classify(&summary, &self.config.truth);
        let decision = DecisionAuthority::new(self.config.policy.clone()).decide(&truth, &summary);

        info!(
            pages = frontier.pages_visited(),
            traces = state.traces.len(),
            verdict = decision.verdict.as_str(),
            "scan finished"
        );

        ScanReport {
            start_url,
            frontier: frontier.stats(),
            traces: state.traces,
            observations,
            verdicts,
            summary,
            truth,
            decision,
            determinism_factors: state.factors,
        }
    }
}

/// Record `reason` for every expectation the given steps would judge.
fn defer_steps(steps: &[FlowStep], reason: UnattemptedReason, state: &mut RunState) {
    for id in steps.iter().filter_map(|s| s.expectation.as_deref()) {
        state.defer(id, reason);
    }
}

/// Canonical start page of `flow`: its url resolved against the start URL,
/// or the start URL itself. Leaving the start origin is invalid input.
fn flow_start_url(start_url: &str, flow: &Flow, frontier: &CrawlFrontier) -> DomainResult<String> {
    let Some(route) = flow.url.as_deref() else {
        return frontier.canonicalize(start_url);
    };
    let resolved = Url::parse(start_url)
        .and_then(|base| base.join(route))
        .map_err(|e| DomainError::ValidationFailed(format!("flow {} has invalid url '{route}': {e}", flow.id)))?;
    if !frontier.is_same_origin(resolved.as_str()) {
        return Err(DomainError::ValidationFailed(format!(
            "flow {} starts outside the scanned origin: {resolved}",
            flow.id
        )));
    }
    frontier.canonicalize(resolved.as_str())
}

/// Routes the project declares: the start page plus every distinct route
/// named by an expectation. Fixed for the whole run.
fn declared_route_count(start: &str, expectations: &[Expectation], frontier: &CrawlFrontier) -> usize {
    let mut routes: BTreeSet<String> = BTreeSet::from([start.to_string()]);
    for route in expectations.iter().filter_map(|e| e.route.as_deref()) {
        if let Some(canonical) = Url::parse(start)
            .and_then(|base| base.join(route))
            .ok()
            .and_then(|resolved| frontier.canonicalize(resolved.as_str()).ok())
        {
            routes.insert(canonical);
        }
    }
    routes.len()
}

/// Expectations bound to `interaction` by selector.
fn bind<'a>(interaction: &InteractionDescriptor, on_page: &'a [Expectation]) -> Vec<&'a Expectation> {
    on_page
        .iter()
        .filter(|e| e.selector.as_deref() == Some(interaction.selector.as_str()))
        .collect()
}

/// Whether an expectation's route designates the canonical `page_url`.
/// Relative routes resolve against the page; no route matches every page.
fn route_matches(route: Option<&str>, page_url: &str, frontier: &CrawlFrontier) -> bool {
    let Some(route) = route else {
        return true;
    };
    Url::parse(page_url)
        .and_then(|base| base.join(route))
        .ok()
        .and_then(|resolved| frontier.canonicalize(resolved.as_str()).ok())
        .is_some_and(|canonical| canonical == page_url)
}
