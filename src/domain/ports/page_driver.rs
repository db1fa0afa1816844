//! Page driver port - interface for browser automation backends.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::broadcast;

use crate::domain::errors::DriverError;
use crate::domain::models::{
    InteractionDescriptor, LoadState, NavigationResponse, PageEvent, PageSnapshot,
};

/// Trait for browser automation backends.
///
/// One driver instance owns one page. Implementations never apply their own
/// timeouts to these calls: the pipeline wraps every call in an explicit
/// deadline and treats expiry as a normal outcome.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Get the driver type name.
    fn name(&self) -> &'static str;

    /// Subscribe to request, response and DOM-mutation events.
    ///
    /// Events emitted before the call are not replayed.
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;

    /// Navigate the page to `url`.
    async fn goto(&self, url: &str) -> Result<NavigationResponse, DriverError>;

    /// Resolve once the document reaches `state`.
    async fn wait_for_load_state(&self, state: LoadState) -> Result<(), DriverError>;

    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    async fn fill(&self, selector: &str, value: &str) -> Result<(), DriverError>;

    async fn hover(&self, selector: &str) -> Result<(), DriverError>;

    async fn focus(&self, selector: &str) -> Result<(), DriverError>;

    /// Press `key` with `selector` focused.
    async fn press(&self, selector: &str, key: &str) -> Result<(), DriverError>;

    async fn set_input_files(&self, selector: &str, files: &[PathBuf])
        -> Result<(), DriverError>;

    /// Evaluate a script in the page and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError>;

    /// Capture URL, DOM fingerprint, storage and feedback markers.
    async fn snapshot(&self) -> Result<PageSnapshot, DriverError>;

    /// Hrefs of anchors currently on the page, unresolved.
    async fn discover_links(&self) -> Result<Vec<String>, DriverError>;

    /// Interactive elements currently on the page.
    async fn discover_interactions(&self) -> Result<Vec<InteractionDescriptor>, DriverError>;
}
