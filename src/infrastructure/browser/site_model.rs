//! Declarative description of a site for the scripted driver.
//!
//! A site model lists pages by absolute URL. Each page carries its links,
//! its interactive elements and, per element, the effect that performing it
//! has on the page: navigation, DOM and feedback changes, network calls,
//! loading markers and storage writes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use url::Url;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FeedbackMarkers, InteractionDescriptor};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteModel {
    #[serde(default)]
    pub pages: Vec<ScriptedPage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedPage {
    pub url: String,
    #[serde(default = "default_status")]
    pub status: u16,
    /// DOM fingerprint; derived from the URL when absent.
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub element_count: u32,
    #[serde(default)]
    pub storage: BTreeMap<String, String>,
    #[serde(default)]
    pub feedback: FeedbackMarkers,
    /// Anchor hrefs, unresolved.
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub interactions: Vec<ScriptedInteraction>,
    /// Results returned by `evaluate`, keyed by script text.
    #[serde(default)]
    pub scripts: BTreeMap<String, serde_json::Value>,
    /// When set, navigating here fails with this reason.
    #[serde(default)]
    pub navigation_error: Option<String>,
}

const fn default_status() -> u16 {
    200
}

impl ScriptedPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: default_status(),
            fingerprint: None,
            element_count: 0,
            storage: BTreeMap::new(),
            feedback: FeedbackMarkers::default(),
            links: Vec::new(),
            interactions: Vec::new(),
            scripts: BTreeMap::new(),
            navigation_error: None,
        }
    }

    pub fn with_link(mut self, href: impl Into<String>) -> Self {
        self.links.push(href.into());
        self
    }

    pub fn with_interaction(mut self, interaction: ScriptedInteraction) -> Self {
        self.interactions.push(interaction);
        self
    }

    pub fn fingerprint(&self) -> String {
        self.fingerprint
            .clone()
            .unwrap_or_else(|| format!("page:{}", self.url))
    }

    /// The interaction fired by acting on `selector`, matching either the
    /// element itself or its submit control.
    pub fn trigger_for(&self, selector: &str) -> Option<&ScriptedInteraction> {
        self.interactions.iter().find(|i| {
            i.descriptor.selector == selector
                || i.descriptor.submit_selector.as_deref() == Some(selector)
        })
    }

    /// Whether any element on the page answers to `selector`.
    pub fn has_element(&self, selector: &str) -> bool {
        self.trigger_for(selector).is_some()
            || self
                .interactions
                .iter()
                .flat_map(|i| &i.descriptor.fields)
                .any(|f| f.selector == selector)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedInteraction {
    #[serde(flatten)]
    pub descriptor: InteractionDescriptor,
    #[serde(default)]
    pub effect: Effect,
    /// Number of initial attempts that fail with a driver error.
    #[serde(default)]
    pub fail_times: u32,
}

impl ScriptedInteraction {
    pub fn new(descriptor: InteractionDescriptor) -> Self {
        Self {
            descriptor,
            effect: Effect::default(),
            fail_times: 0,
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = effect;
        self
    }

    pub fn failing(mut self, times: u32) -> Self {
        self.fail_times = times;
        self
    }
}

/// What performing an interaction does to the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    /// Wait before any part of the effect becomes visible.
    #[serde(default)]
    pub delay_ms: u64,
    /// Time the action itself blocks before returning.
    #[serde(default)]
    pub hang_ms: u64,
    /// Navigation target, resolved against the current URL. Links navigate
    /// to their `href` when unset.
    #[serde(default)]
    pub navigate: Option<String>,
    /// New DOM fingerprint.
    #[serde(default)]
    pub dom: Option<String>,
    #[serde(default)]
    pub element_count: Option<u32>,
    /// Replaces the page's feedback markers.
    #[serde(default)]
    pub feedback: Option<FeedbackMarkers>,
    #[serde(default)]
    pub storage: BTreeMap<String, String>,
    #[serde(default)]
    pub network: Vec<NetworkCall>,
    #[serde(default)]
    pub loading: Option<LoadingEffect>,
    /// Structural mutations emitted in addition to those implied by `dom`
    /// and `feedback`.
    #[serde(default)]
    pub mutations: u32,
    /// Text-only mutations; these never delay stability.
    #[serde(default)]
    pub text_mutations: u32,
    /// Error message used for scripted failures.
    #[serde(default)]
    pub error: Option<String>,
}

impl Effect {
    pub fn navigate(target: impl Into<String>) -> Self {
        Self {
            navigate: Some(target.into()),
            ..Default::default()
        }
    }

    pub fn dom(fingerprint: impl Into<String>) -> Self {
        Self {
            dom: Some(fingerprint.into()),
            ..Default::default()
        }
    }

    pub fn with_feedback(mut self, feedback: FeedbackMarkers) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn with_network(mut self, call: NetworkCall) -> Self {
        self.network.push(call);
        self
    }

    pub fn with_loading(mut self, loading: LoadingEffect) -> Self {
        self.loading = Some(loading);
        self
    }

    pub fn with_storage(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.storage.insert(key.into(), value.into());
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_hang_ms(mut self, hang_ms: u64) -> Self {
        self.hang_ms = hang_ms;
        self
    }
}

/// A request issued by an effect. `status: None` means the request fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCall {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub latency_ms: u64,
}

fn default_method() -> String {
    "GET".to_string()
}

impl NetworkCall {
    pub fn new(url: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            status,
            latency_ms: 0,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

/// Loading indicators shown by an effect, optionally cleared later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingEffect {
    #[serde(default = "default_indicators")]
    pub indicators: u32,
    /// Never resolves when unset.
    #[serde(default)]
    pub resolve_after_ms: Option<u64>,
}

const fn default_indicators() -> u32 {
    1
}

/// Document part of a URL, used as the page lookup key.
pub fn document_key(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    url.set_fragment(None);
    Some(url.to_string())
}

impl SiteModel {
    pub fn new(pages: Vec<ScriptedPage>) -> Self {
        Self { pages }
    }

    /// Load a site model from YAML, or JSON when the extension is `.json`.
    pub fn from_path(path: impl AsRef<Path>) -> DomainResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let model: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&raw)?
        } else {
            serde_yaml::from_str(&raw)?
        };
        model.validate()?;
        Ok(model)
    }

    /// Page URLs must be absolute and unique per document.
    pub fn validate(&self) -> DomainResult<()> {
        let mut seen = HashSet::new();
        for page in &self.pages {
            let key = document_key(&page.url).ok_or_else(|| DomainError::InvalidUrl {
                url: page.url.clone(),
                reason: "site model pages need absolute URLs".to_string(),
            })?;
            if !seen.insert(key) {
                return Err(DomainError::ValidationFailed(format!(
                    "duplicate page in site model: {}",
                    page.url
                )));
            }
        }
        Ok(())
    }

    pub fn page_index(&self, url: &str) -> Option<usize> {
        let key = document_key(url)?;
        self.pages
            .iter()
            .position(|p| document_key(&p.url).as_deref() == Some(key.as_str()))
    }
}
