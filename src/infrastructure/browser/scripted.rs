//! [`PageDriver`] backed by a [`SiteModel`] instead of a real browser.
//!
//! Effects play out on the tokio clock: delayed effects, response latency
//! and loading resolution are spawned tasks, so paused-time tests observe
//! the same event timing on every run.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};
use url::Url;

use super::site_model::{document_key, Effect, LoadingEffect, NetworkCall, SiteModel};
use crate::domain::errors::DriverError;
use crate::domain::models::{
    InteractionDescriptor, InteractionKind, LoadState, MutationKind, NavigationResponse,
    PageEvent, PageSnapshot,
};
use crate::domain::ports::PageDriver;

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct LiveState {
    snapshot: PageSnapshot,
    page: Option<usize>,
    /// Bumped on every document load; stale delayed effects are dropped.
    generation: u64,
    failures_used: HashMap<String, u32>,
}

struct Shared {
    site: SiteModel,
    state: RwLock<LiveState>,
    events: broadcast::Sender<PageEvent>,
}

/// Scripted page driver for offline scans and tests.
#[derive(Clone)]
pub struct ScriptedPageDriver {
    shared: Arc<Shared>,
}

impl ScriptedPageDriver {
    pub fn new(site: SiteModel) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                site,
                state: RwLock::new(LiveState::default()),
                events,
            }),
        }
    }

    /// Current URL, empty before the first navigation.
    pub async fn current_url(&self) -> String {
        self.shared.state.read().await.snapshot.url.clone()
    }

    async fn trigger(&self, selector: &str) -> Result<(), DriverError> {
        let shared = &self.shared;
        let (scripted, generation) = {
            let mut state = shared.state.write().await;
            let page = state
                .page
                .map(|i| &shared.site.pages[i])
                .ok_or(DriverError::PageClosed)?;
            let Some(scripted) = page.trigger_for(selector) else {
                return if page.has_element(selector) {
                    Ok(())
                } else {
                    Err(DriverError::ElementNotFound(selector.to_string()))
                };
            };

            let used = state.failures_used.entry(selector.to_string()).or_insert(0);
            if *used < scripted.fail_times {
                *used += 1;
                let message = scripted
                    .effect
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("scripted failure on {selector}"));
                return Err(DriverError::Other(message));
            }
            (scripted.clone(), state.generation)
        };

        if scripted.effect.hang_ms > 0 {
            tokio::time::sleep(Duration::from_millis(scripted.effect.hang_ms)).await;
        }

        let fallback = link_target(&scripted.descriptor);
        debug!(selector, kind = %scripted.descriptor.kind, "triggering scripted effect");

        let effect = scripted.effect;
        if effect.delay_ms > 0 {
            let shared = Arc::clone(shared);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(effect.delay_ms)).await;
                shared.apply(&effect, fallback, generation).await;
            });
        } else {
            shared.apply(&effect, fallback, generation).await;
        }
        Ok(())
    }

    async fn require_element(&self, selector: &str) -> Result<(), DriverError> {
        let state = self.shared.state.read().await;
        let page = state
            .page
            .map(|i| &self.shared.site.pages[i])
            .ok_or(DriverError::PageClosed)?;
        if page.has_element(selector) {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(selector.to_string()))
        }
    }
}

fn link_target(descriptor: &InteractionDescriptor) -> Option<String> {
    match descriptor.kind {
        InteractionKind::Link => descriptor.href.clone(),
        _ => None,
    }
}

impl Shared {
    fn emit(&self, event: PageEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn load(&self, url: &str) -> Result<NavigationResponse, DriverError> {
        let key = document_key(url).ok_or_else(|| DriverError::NavigationFailed {
            url: url.to_string(),
            reason: "invalid URL".to_string(),
        })?;
        let index = self.site.page_index(url);
        let page = index.map(|i| &self.site.pages[i]);

        if let Some(reason) = page.and_then(|p| p.navigation_error.clone()) {
            self.emit(PageEvent::Request {
                url: key.clone(),
                method: "GET".to_string(),
            });
            self.emit(PageEvent::RequestFailed { url: key.clone() });
            return Err(DriverError::NavigationFailed { url: key, reason });
        }

        let status = page.map_or(404, |p| p.status);
        self.emit(PageEvent::Request {
            url: key.clone(),
            method: "GET".to_string(),
        });
        self.emit(PageEvent::Response {
            url: key,
            status,
        });

        {
            let mut state = self.state.write().await;
            let mut storage = std::mem::take(&mut state.snapshot.storage);
            let snapshot = match page {
                Some(p) => {
                    storage.extend(p.storage.clone());
                    PageSnapshot {
                        url: url.to_string(),
                        dom_fingerprint: p.fingerprint(),
                        element_count: p.element_count,
                        storage,
                        feedback: p.feedback.clone(),
                    }
                }
                None => PageSnapshot {
                    url: url.to_string(),
                    dom_fingerprint: "not-found".to_string(),
                    storage,
                    ..Default::default()
                },
            };
            state.snapshot = snapshot;
            state.page = index;
            state.generation += 1;
        }
        self.emit(PageEvent::Mutation {
            kind: MutationKind::ChildList,
        });

        Ok(NavigationResponse {
            url: url.to_string(),
            status: Some(status),
        })
    }

    async fn apply(self: &Arc<Self>, effect: &Effect, fallback: Option<String>, generation: u64) {
        if self.state.read().await.generation != generation {
            debug!("dropping effect scheduled for a previous document");
            return;
        }

        for call in &effect.network {
            self.start_call(call);
        }

        let mut generation = generation;
        if let Some(target) = effect.navigate.clone().or(fallback) {
            match self.navigate_from_current(&target).await {
                Ok(next) => generation = next,
                Err(err) => warn!(target, error = %err, "scripted navigation failed"),
            }
        }

        let structural = {
            let mut state = self.state.write().await;
            let snapshot = &mut state.snapshot;
            let mut changed = 0;
            if let Some(fingerprint) = &effect.dom {
                snapshot.dom_fingerprint.clone_from(fingerprint);
                changed += 1;
            }
            if let Some(count) = effect.element_count {
                snapshot.element_count = count;
            }
            if let Some(feedback) = &effect.feedback {
                let loading = snapshot.feedback.loading_indicators;
                snapshot.feedback = feedback.clone();
                snapshot.feedback.loading_indicators = loading.max(feedback.loading_indicators);
                changed += 1;
            }
            snapshot.storage.extend(effect.storage.clone());
            if let Some(loading) = &effect.loading {
                snapshot.feedback.loading_indicators += loading.indicators;
            }
            changed + effect.mutations
        };

        for _ in 0..structural {
            self.emit(PageEvent::Mutation {
                kind: MutationKind::ChildList,
            });
        }
        for _ in 0..effect.text_mutations {
            self.emit(PageEvent::Mutation {
                kind: MutationKind::CharacterData,
            });
        }

        if let Some(loading) = &effect.loading {
            self.emit(PageEvent::Mutation {
                kind: MutationKind::Attributes,
            });
            self.schedule_loading_resolution(loading, generation);
        }
    }

    /// Follow `target` from the current URL. Fragment-only changes keep the
    /// document. Returns the generation the rest of the effect applies to.
    async fn navigate_from_current(&self, target: &str) -> Result<u64, DriverError> {
        let current = self.state.read().await.snapshot.url.clone();
        let resolved = Url::parse(&current)
            .and_then(|base| base.join(target))
            .or_else(|_| Url::parse(target))
            .map_err(|e| DriverError::NavigationFailed {
                url: target.to_string(),
                reason: e.to_string(),
            })?
            .to_string();

        if document_key(&resolved) == document_key(&current) && resolved != current {
            let mut state = self.state.write().await;
            state.snapshot.url = resolved;
            return Ok(state.generation);
        }

        self.load(&resolved).await?;
        Ok(self.state.read().await.generation)
    }

    fn start_call(self: &Arc<Self>, call: &NetworkCall) {
        self.emit(PageEvent::Request {
            url: call.url.clone(),
            method: call.method.clone(),
        });
        let completion = match call.status {
            Some(status) => PageEvent::Response {
                url: call.url.clone(),
                status,
            },
            None => PageEvent::RequestFailed {
                url: call.url.clone(),
            },
        };
        if call.latency_ms == 0 {
            self.emit(completion);
        } else {
            let shared = Arc::clone(self);
            let latency = Duration::from_millis(call.latency_ms);
            tokio::spawn(async move {
                tokio::time::sleep(latency).await;
                shared.emit(completion);
            });
        }
    }

    fn schedule_loading_resolution(self: &Arc<Self>, loading: &LoadingEffect, generation: u64) {
        let Some(after) = loading.resolve_after_ms else {
            return;
        };
        let shared = Arc::clone(self);
        let indicators = loading.indicators;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(after)).await;
            {
                let mut state = shared.state.write().await;
                if state.generation != generation {
                    return;
                }
                let feedback = &mut state.snapshot.feedback;
                feedback.loading_indicators = feedback.loading_indicators.saturating_sub(indicators);
            }
            shared.emit(PageEvent::Mutation {
                kind: MutationKind::Attributes,
            });
        });
    }
}

#[async_trait]
impl PageDriver for ScriptedPageDriver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.shared.events.subscribe()
    }

    async fn goto(&self, url: &str) -> Result<NavigationResponse, DriverError> {
        self.shared.load(url).await
    }

    async fn wait_for_load_state(&self, _state: LoadState) -> Result<(), DriverError> {
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.trigger(selector).await
    }

    async fn fill(&self, selector: &str, _value: &str) -> Result<(), DriverError> {
        self.require_element(selector).await
    }

    async fn hover(&self, selector: &str) -> Result<(), DriverError> {
        self.trigger(selector).await
    }

    async fn focus(&self, selector: &str) -> Result<(), DriverError> {
        self.require_element(selector).await
    }

    async fn press(&self, selector: &str, _key: &str) -> Result<(), DriverError> {
        self.trigger(selector).await
    }

    async fn set_input_files(
        &self,
        selector: &str,
        _files: &[PathBuf],
    ) -> Result<(), DriverError> {
        self.trigger(selector).await
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        let state = self.shared.state.read().await;
        state
            .page
            .and_then(|i| self.shared.site.pages[i].scripts.get(script).cloned())
            .ok_or_else(|| DriverError::ScriptFailed(format!("no scripted result for `{script}`")))
    }

    async fn snapshot(&self) -> Result<PageSnapshot, DriverError> {
        let state = self.shared.state.read().await;
        if state.snapshot.url.is_empty() {
            return Err(DriverError::PageClosed);
        }
        Ok(state.snapshot.clone())
    }

    async fn discover_links(&self) -> Result<Vec<String>, DriverError> {
        let state = self.shared.state.read().await;
        let Some(page) = state.page.map(|i| &self.shared.site.pages[i]) else {
            return Ok(Vec::new());
        };
        let mut links = page.links.clone();
        for interaction in &page.interactions {
            if let Some(href) = link_target(&interaction.descriptor) {
                if !links.contains(&href) {
                    links.push(href);
                }
            }
        }
        Ok(links)
    }

    async fn discover_interactions(&self) -> Result<Vec<InteractionDescriptor>, DriverError> {
        let state = self.shared.state.read().await;
        Ok(state
            .page
            .map(|i| {
                self.shared.site.pages[i]
                    .interactions
                    .iter()
                    .map(|s| s.descriptor.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}
