//! Stabilization engine.
//!
//! Decides when an interaction's effects have finished propagating. Three
//! signals are combined under one hard deadline (`settle_timeout_ms`):
//!
//! 1. the document reaching `DOMContentLoaded`,
//! 2. network idle: no request/response events for `settle_idle_ms`,
//! 3. DOM stable: no counted mutation for `settle_dom_stable_ms`
//!    (text-only changes excluded).
//!
//! With adaptive stabilization enabled, each idle window may grow by its
//! base length when activity restarts after the page had started to go
//! quiet, at most `adaptive_extension_limit` times. The hard deadline is
//! never exceeded. Adaptive mode must stay off for reproducibility runs.
//!
//! Settling never fails: a missed deadline is reported in
//! [`SettleOutcome::timed_out`] and folds into `runComplete = false`.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, instrument, warn};

use crate::domain::models::{LoadState, PageEvent, ScanBudget, SettleOutcome};
use crate::domain::ports::PageDriver;

/// Idle detector for one activity source.
#[derive(Debug, Clone)]
struct IdleWindow {
    base: Duration,
    window: Duration,
    last_activity: Instant,
    adaptive: bool,
    extension_limit: u32,
    extensions: u32,
}

impl IdleWindow {
    fn new(base: Duration, start: Instant, adaptive: bool, extension_limit: u32) -> Self {
        Self {
            base,
            window: base,
            last_activity: start,
            adaptive,
            extension_limit,
            extensions: 0,
        }
    }

    /// Record activity at `at`. Activity arriving after at least half the
    /// current window passed quietly counts as a restart.
    fn record(&mut self, at: Instant) {
        let quiet_for = at.saturating_duration_since(self.last_activity);
        if self.adaptive && self.extensions < self.extension_limit && quiet_for >= self.window / 2 {
            self.extensions += 1;
            self.window += self.base;
        }
        self.last_activity = at;
    }

    fn deadline(&self) -> Instant {
        self.last_activity + self.window
    }

    fn is_quiet(&self, now: Instant) -> bool {
        now >= self.deadline()
    }
}

/// Bounded wait for network and DOM quiescence.
#[derive(Debug, Clone)]
pub struct StabilizationEngine {
    settle_timeout: Duration,
    network_idle: Duration,
    dom_stable: Duration,
    adaptive: bool,
    extension_limit: u32,
}

impl StabilizationEngine {
    pub fn new(budget: &ScanBudget) -> Self {
        Self {
            settle_timeout: budget.settle_timeout(),
            network_idle: budget.settle_idle(),
            dom_stable: budget.settle_dom_stable(),
            adaptive: budget.adaptive_stabilization,
            extension_limit: budget.adaptive_extension_limit,
        }
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    /// Wait for the page to settle. Drains `events` while waiting.
    #[instrument(skip_all, fields(driver = page.name()))]
    pub async fn settle(
        &self,
        page: &dyn PageDriver,
        events: &mut broadcast::Receiver<PageEvent>,
    ) -> SettleOutcome {
        let started = Instant::now();
        let hard_deadline = started + self.settle_timeout;

        let load_state_reached = matches!(
            timeout_at(hard_deadline, page.wait_for_load_state(LoadState::DomContentLoaded)).await,
            Ok(Ok(()))
        );
        if !load_state_reached {
            debug!("load state not reached before settle deadline");
        }

        let mut outcome = self.wait_for_quiet(events, started, hard_deadline).await;
        outcome.load_state_reached = load_state_reached;
        outcome
    }

    /// Idle detection over the event stream, bounded by `hard_deadline`.
    pub async fn wait_for_quiet(
        &self,
        events: &mut broadcast::Receiver<PageEvent>,
        started: Instant,
        hard_deadline: Instant,
    ) -> SettleOutcome {
        let now = Instant::now();
        let mut network = IdleWindow::new(self.network_idle, now, self.adaptive, self.extension_limit);
        let mut dom = IdleWindow::new(self.dom_stable, now, self.adaptive, self.extension_limit);
        let mut outcome = SettleOutcome::default();
        let mut channel_open = true;

        loop {
            let now = Instant::now();
            if network.is_quiet(now) && dom.is_quiet(now) {
                break;
            }
            if now >= hard_deadline {
                outcome.timed_out = true;
                break;
            }

            let mut wake = hard_deadline;
            if !network.is_quiet(now) {
                wake = wake.min(network.deadline());
            }
            if !dom.is_quiet(now) {
                wake = wake.min(dom.deadline());
            }

            if !channel_open {
                sleep_until(wake).await;
                continue;
            }

            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        let at = Instant::now();
                        outcome.activity.record(&event);
                        match &event {
                            PageEvent::Mutation { kind } => {
                                if kind.counts_for_stability() {
                                    dom.record(at);
                                }
                            }
                            _ => network.record(at),
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        // Unknown what was dropped; treat as activity on both sources.
                        warn!(missed, "settle event stream lagged");
                        let at = Instant::now();
                        network.record(at);
                        dom.record(at);
                    }
                    Err(RecvError::Closed) => channel_open = false,
                },
                () = sleep_until(wake) => {}
            }
        }

        let end = Instant::now();
        outcome.network_idle = network.is_quiet(end);
        outcome.dom_stable = dom.is_quiet(end);
        outcome.extensions_used = network.extensions + dom.extensions;
        outcome.elapsed_ms = end.saturating_duration_since(started).as_millis() as u64;

        if outcome.timed_out {
            warn!(
                network_idle = outcome.network_idle,
                dom_stable = outcome.dom_stable,
                "settle timed out"
            );
        } else {
            debug!(
                elapsed_ms = outcome.elapsed_ms,
                extensions = outcome.extensions_used,
                "page settled"
            );
        }
        outcome
    }
}

/// Settle `page` under `budget`.
pub async fn settle(
    page: &dyn PageDriver,
    events: &mut broadcast::Receiver<PageEvent>,
    budget: &ScanBudget,
) -> SettleOutcome {
    StabilizationEngine::new(budget).settle(page, events).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BudgetOverrides, BudgetProfile, MutationKind};

    fn budget(adaptive: bool) -> ScanBudget {
        ScanBudget::build(
            BudgetProfile::Standard,
            &BudgetOverrides {
                settle_timeout_ms: Some(5_000),
                settle_idle_ms: Some(500),
                settle_dom_stable_ms: Some(500),
                adaptive_stabilization: Some(adaptive),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn request() -> PageEvent {
        PageEvent::Request {
            url: "https://a.test/api".into(),
            method: "GET".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_page_settles_after_idle_window() {
        let engine = StabilizationEngine::new(&budget(false));
        let (_tx, mut rx) = broadcast::channel(16);
        let start = Instant::now();

        let outcome = engine
            .wait_for_quiet(&mut rx, start, start + Duration::from_secs(5))
            .await;

        assert!(!outcome.timed_out);
        assert!(outcome.network_idle && outcome.dom_stable);
        assert_eq!(Instant::now() - start, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_resets_idle_window() {
        let engine = StabilizationEngine::new(&budget(false));
        let (tx, mut rx) = broadcast::channel(16);
        let start = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            let _ = tx.send(request());
            tokio::time::sleep(Duration::from_millis(300)).await;
            let _ = tx.send(PageEvent::Mutation {
                kind: MutationKind::ChildList,
            });
            // keep the channel open past the settle window
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let outcome = engine
            .wait_for_quiet(&mut rx, start, start + Duration::from_secs(5))
            .await;

        assert!(!outcome.timed_out);
        assert_eq!(outcome.activity.requests, 1);
        assert_eq!(outcome.activity.mutations, 1);
        // last mutation at 600ms + 500ms DOM window
        assert_eq!(Instant::now() - start, Duration::from_millis(1_100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_mutations_do_not_delay_settle() {
        let engine = StabilizationEngine::new(&budget(false));
        let (tx, mut rx) = broadcast::channel(16);
        let start = Instant::now();

        tokio::spawn(async move {
            for _ in 0..4 {
                tokio::time::sleep(Duration::from_millis(200)).await;
                let _ = tx.send(PageEvent::Mutation {
                    kind: MutationKind::CharacterData,
                });
            }
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let outcome = engine
            .wait_for_quiet(&mut rx, start, start + Duration::from_secs(5))
            .await;

        assert!(outcome.dom_stable);
        assert_eq!(outcome.activity.mutations, 0);
        assert_eq!(Instant::now() - start, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_deadline_is_never_exceeded() {
        let engine = StabilizationEngine::new(&budget(true));
        let (tx, mut rx) = broadcast::channel(64);
        let start = Instant::now();

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(100)).await;
                if tx.send(request()).is_err() {
                    break;
                }
            }
        });

        let outcome = engine
            .wait_for_quiet(&mut rx, start, start + Duration::from_secs(5))
            .await;

        assert!(outcome.timed_out);
        assert!(!outcome.network_idle);
        assert_eq!(Instant::now() - start, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_adaptive_extensions_are_bounded() {
        let engine = StabilizationEngine::new(&budget(true));
        let (tx, mut rx) = broadcast::channel(16);
        let start = Instant::now();

        tokio::spawn(async move {
            // each burst lands after the window is at least half elapsed
            for gap in [300u64, 400, 600, 900] {
                tokio::time::sleep(Duration::from_millis(gap)).await;
                let _ = tx.send(request());
            }
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let outcome = engine
            .wait_for_quiet(&mut rx, start, start + Duration::from_secs(5))
            .await;

        assert!(!outcome.timed_out);
        assert_eq!(outcome.extensions_used, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_mode_never_extends() {
        let engine = StabilizationEngine::new(&budget(false));
        let (tx, mut rx) = broadcast::channel(16);
        let start = Instant::now();

        tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(400)).await;
                let _ = tx.send(request());
            }
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let outcome = engine
            .wait_for_quiet(&mut rx, start, start + Duration::from_secs(5))
            .await;

        assert_eq!(outcome.extensions_used, 0);
        assert_eq!(Instant::now() - start, Duration::from_millis(1_700));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_still_waits_for_window() {
        let engine = StabilizationEngine::new(&budget(false));
        let (tx, mut rx) = broadcast::channel::<PageEvent>(4);
        drop(tx);
        let start = Instant::now();

        let outcome = engine
            .wait_for_quiet(&mut rx, start, start + Duration::from_secs(5))
            .await;

        assert!(outcome.network_idle && outcome.dom_stable);
        assert_eq!(Instant::now() - start, Duration::from_millis(500));
    }
}
