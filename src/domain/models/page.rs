//! Page-level types exchanged with the browser driver.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Document readiness state awaited before idle detection starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    DomContentLoaded,
    Load,
}

/// DOM mutation categories reported by the driver's mutation observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

impl MutationKind {
    /// Text-only changes do not keep the DOM from being considered stable.
    pub fn counts_for_stability(&self) -> bool {
        !matches!(self, Self::CharacterData)
    }
}

/// Raw events streamed by the driver while a page is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PageEvent {
    Request { url: String, method: String },
    Response { url: String, status: u16 },
    RequestFailed { url: String },
    Mutation { kind: MutationKind },
}

impl PageEvent {
    pub fn is_network(&self) -> bool {
        !matches!(self, Self::Mutation { .. })
    }
}

/// Response to a top-level navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationResponse {
    pub url: String,
    pub status: Option<u16>,
}

/// User-visible feedback markers present on the page at snapshot time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackMarkers {
    /// Visible toast/snackbar/banner elements.
    #[serde(default)]
    pub toasts: u32,
    /// Current text of `aria-live` regions, in document order.
    #[serde(default)]
    pub aria_live_text: Vec<String>,
    /// Elements with `role="alert"` or `role="status"`.
    #[serde(default)]
    pub role_alerts: u32,
    /// Visible spinners, skeletons, `aria-busy` regions.
    #[serde(default)]
    pub loading_indicators: u32,
    /// Inline validation or error messages.
    #[serde(default)]
    pub validation_messages: u32,
}

impl FeedbackMarkers {
    pub fn has_visible_feedback(&self) -> bool {
        self.toasts > 0 || self.validation_messages > 0
    }
}

/// Point-in-time view of a page used for before/after comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    /// Stable digest of the visible DOM structure.
    pub dom_fingerprint: String,
    /// Number of visible elements, used to size DOM changes.
    #[serde(default)]
    pub element_count: u32,
    /// Combined localStorage, sessionStorage and cookie names mapped to values.
    #[serde(default)]
    pub storage: BTreeMap<String, String>,
    #[serde(default)]
    pub feedback: FeedbackMarkers,
}

/// Events drained while waiting for a page to settle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub requests: u32,
    pub failed_requests: u32,
    pub statuses: Vec<u16>,
    /// Mutations that count for stability (text-only changes excluded).
    pub mutations: u32,
}

impl ActivityLog {
    pub fn record(&mut self, event: &PageEvent) {
        match event {
            PageEvent::Request { .. } => self.requests += 1,
            PageEvent::Response { status, .. } => self.statuses.push(*status),
            PageEvent::RequestFailed { .. } => self.failed_requests += 1,
            PageEvent::Mutation { kind } => {
                if kind.counts_for_stability() {
                    self.mutations += 1;
                }
            }
        }
    }

    pub fn has_network(&self) -> bool {
        self.requests > 0 || self.failed_requests > 0 || !self.statuses.is_empty()
    }
}

/// Result of one stabilization wait. Settling never fails; a hard timeout
/// is reported through `timed_out`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleOutcome {
    pub load_state_reached: bool,
    pub network_idle: bool,
    pub dom_stable: bool,
    pub extensions_used: u32,
    pub timed_out: bool,
    /// Wall-clock duration; kept out of serialized traces.
    #[serde(skip)]
    pub elapsed_ms: u64,
    #[serde(default)]
    pub activity: ActivityLog,
}

impl SettleOutcome {
    /// Whether the page went fully quiet inside the hard timeout.
    pub fn is_complete(&self) -> bool {
        !self.timed_out && self.network_idle && self.dom_stable
    }
}
