//! Domain errors for the Tacit verification pipeline.

use thiserror::Error;

/// Domain-level errors that can occur while preparing or running a scan.
///
/// Classification itself never produces these: the classifiers are pure
/// evidence-evaluation functions and degrade to `UNCLASSIFIABLE`/`UNPROVEN`
/// instead of failing.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid scan budget: {0}")]
    InvalidBudget(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Start URL must use http or https: {0}")]
    UnsupportedScheme(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Unknown budget profile: {0}")]
    UnknownProfile(String),

    #[error("Browser driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for DomainError {
    fn from(err: serde_yaml::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

/// Errors surfaced by a [`PageDriver`](crate::domain::ports::PageDriver).
///
/// Timeouts are deliberately absent: every bounded wait is wrapped by the
/// caller and a timeout is a normal outcome, not a driver error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("Navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("Page closed")]
    PageClosed,

    #[error("Script evaluation failed: {0}")]
    ScriptFailed(String),

    #[error("Driver failure: {0}")]
    Other(String),
}

impl DriverError {
    /// Short machine-readable tag used as a step `finding_type`.
    pub fn finding_type(&self) -> &'static str {
        match self {
            Self::NavigationFailed { .. } => "navigation_error",
            Self::ElementNotFound(_) => "selector_not_found",
            Self::NotInteractable(_) => "element_not_interactable",
            Self::PageClosed => "page_closed",
            Self::ScriptFailed(_) => "script_error",
            Self::Other(_) => "driver_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_converts_to_domain_error() {
        let err: DomainError = DriverError::PageClosed.into();
        assert!(matches!(err, DomainError::Driver(DriverError::PageClosed)));
        assert_eq!(err.to_string(), "Browser driver error: Page closed");
    }

    #[test]
    fn test_finding_types_are_stable() {
        assert_eq!(
            DriverError::ElementNotFound("#go".into()).finding_type(),
            "selector_not_found"
        );
        assert_eq!(
            DriverError::NavigationFailed {
                url: "https://a.test/".into(),
                reason: "dns".into()
            }
            .finding_type(),
            "navigation_error"
        );
    }
}
