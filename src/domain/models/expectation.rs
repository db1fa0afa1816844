//! Expectations: declared promises about what an interaction will do.
//!
//! Expectations are produced upstream by static-source analysis and are
//! immutable once produced. Upgrading an expectation with an action contract
//! yields a new value.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::flow::Flow;

/// The closed set of promise kinds the classifier knows how to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromiseKind {
    Navigation,
    Submit,
    Feedback,
    State,
    Loading,
    Permission,
}

impl PromiseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::Submit => "submit",
            Self::Feedback => "feedback",
            Self::State => "state",
            Self::Loading => "loading",
            Self::Permission => "permission",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "navigation" | "navigate" | "nav" | "route" => Some(Self::Navigation),
            "submit" | "submission" | "form" | "form_submit" => Some(Self::Submit),
            "feedback" | "ui_feedback" | "ui-feedback" => Some(Self::Feedback),
            "state" | "state_change" | "state-change" | "mutation" => Some(Self::State),
            "loading" | "loading_state" => Some(Self::Loading),
            "permission" | "auth" | "authorization" => Some(Self::Permission),
            _ => None,
        }
    }

    /// Infer a kind from free-form promise text by keyword.
    ///
    /// Tokens are matched whole; the first matching row of the table wins.
    pub fn infer(text: &str) -> Option<Self> {
        const TABLE: &[(PromiseKind, &[&str])] = &[
            (
                PromiseKind::Permission,
                &["permission", "forbidden", "unauthorized", "denied", "403", "401", "role"],
            ),
            (
                PromiseKind::Loading,
                &["loading", "spinner", "skeleton", "progress", "busy"],
            ),
            (
                PromiseKind::Submit,
                &["submit", "form", "save", "send", "post", "signup", "register"],
            ),
            (
                PromiseKind::Navigation,
                &["navigate", "navigation", "redirect", "route", "goto", "href", "link"],
            ),
            (
                PromiseKind::Feedback,
                &["toast", "feedback", "message", "notify", "notification", "alert", "banner"],
            ),
            (
                PromiseKind::State,
                &["state", "toggle", "update", "counter", "cart", "store", "change", "set"],
            ),
        ];

        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        TABLE
            .iter()
            .find(|(_, keywords)| tokens.iter().any(|t| keywords.contains(t)))
            .map(|(kind, _)| *kind)
    }
}

impl std::fmt::Display for PromiseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the interaction promises, as extracted from source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promise {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Promise {
    /// Kind, value and description joined for keyword inference.
    pub fn text(&self) -> String {
        [&self.kind, &self.value, &self.description]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Source location the expectation was extracted from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceRef {
    pub file: String,
    #[serde(default)]
    pub line: u32,
}

impl SourceRef {
    /// Contract lookup key: `file:line`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }
}

/// A declared promise that an interaction will produce an observable outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    pub id: String,
    /// Declared type as written upstream; resolved with [`Expectation::promise_kind`].
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
    #[serde(default)]
    pub promise: Promise,
    #[serde(default)]
    pub source: SourceRef,
    /// Route the interaction lives on, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Selector of the interaction that carries the promise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Set when a static action contract backs this expectation.
    #[serde(default)]
    pub proven: bool,
}

impl Expectation {
    pub fn new(id: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            declared_type: Some(declared_type.into()),
            promise: Promise::default(),
            source: SourceRef::default(),
            route: None,
            selector: None,
            proven: false,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.promise.value = Some(value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.promise.description = Some(description.into());
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_source(mut self, file: impl Into<String>, line: u32) -> Self {
        self.source = SourceRef {
            file: file.into(),
            line,
        };
        self
    }

    /// Declared kind when recognizable, otherwise inferred from promise text.
    pub fn promise_kind(&self) -> Option<PromiseKind> {
        self.declared_type
            .as_deref()
            .and_then(PromiseKind::from_str)
            .or_else(|| PromiseKind::infer(&self.promise.text()))
    }

    /// Returns a proven copy when a matching action contract exists.
    pub fn upgraded(&self, contracts: &BTreeMap<String, ActionContract>) -> Self {
        let mut upgraded = self.clone();
        if let Some(contract) = contracts.get(&self.source.key()) {
            upgraded.proven = true;
            if upgraded.selector.is_none() {
                upgraded.selector.clone_from(&contract.selector);
            }
        }
        upgraded
    }
}

/// Statically proven binding between a source location and a UI action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContract {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
}

/// The upstream input document: expectations plus optional contracts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectationInput {
    #[serde(default)]
    pub expectations: Vec<Expectation>,
    #[serde(default)]
    pub action_contracts: BTreeMap<String, ActionContract>,
    #[serde(default)]
    pub flows: Vec<Flow>,
}

impl ExpectationInput {
    /// Expectation and flow ids must be non-empty and unique. Flow steps
    /// are checked one at a time when they run.
    pub fn validate(&self) -> DomainResult<()> {
        let mut seen = HashSet::new();
        for expectation in &self.expectations {
            if expectation.id.trim().is_empty() {
                return Err(DomainError::ValidationFailed(
                    "expectation id cannot be empty".to_string(),
                ));
            }
            if !seen.insert(expectation.id.as_str()) {
                return Err(DomainError::ValidationFailed(format!(
                    "duplicate expectation id: {}",
                    expectation.id
                )));
            }
        }
        let mut flow_ids = HashSet::new();
        for flow in &self.flows {
            if flow.id.trim().is_empty() {
                return Err(DomainError::ValidationFailed("flow id cannot be empty".to_string()));
            }
            if !flow_ids.insert(flow.id.as_str()) {
                return Err(DomainError::ValidationFailed(format!(
                    "duplicate flow id: {}",
                    flow.id
                )));
            }
        }
        Ok(())
    }

    /// Expectations with action contracts applied, in input order.
    pub fn resolved(&self) -> Vec<Expectation> {
        self.expectations
            .iter()
            .map(|e| e.upgraded(&self.action_contracts))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_type_wins() {
        let exp = Expectation::new("e1", "navigation").with_value("show toast");
        assert_eq!(exp.promise_kind(), Some(PromiseKind::Navigation));
    }

    #[test]
    fn test_kind_inferred_from_text_when_undeclared() {
        let mut exp = Expectation::new("e1", "unknown-kind");
        exp.promise.description = Some("Shows a toast after saving".into());
        assert_eq!(exp.promise_kind(), Some(PromiseKind::Feedback));

        exp.promise.description = Some("Save the form and show a toast".into());
        // submit is checked before feedback
        assert_eq!(exp.promise_kind(), Some(PromiseKind::Submit));

        let mut exp = Expectation::new("e2", "");
        exp.promise.value = Some("redirect to /dashboard".into());
        assert_eq!(exp.promise_kind(), Some(PromiseKind::Navigation));
    }

    #[test]
    fn test_no_kind_for_opaque_text() {
        let mut exp = Expectation::new("e1", "");
        exp.promise.value = Some("zzz".into());
        assert_eq!(exp.promise_kind(), None);
    }

    #[test]
    fn test_infer_matches_whole_tokens_only() {
        // "settings" must not match the "set" keyword
        assert_eq!(PromiseKind::infer("open settings"), None);
        assert_eq!(PromiseKind::infer("returns 403"), Some(PromiseKind::Permission));
    }

    #[test]
    fn test_contract_upgrade_returns_new_value() {
        let exp = Expectation::new("e1", "submit").with_source("src/Form.tsx", 42);
        let mut contracts = BTreeMap::new();
        contracts.insert(
            "src/Form.tsx:42".to_string(),
            ActionContract {
                kind: "submit".into(),
                selector: Some("#signup".into()),
                handler: None,
            },
        );

        let upgraded = exp.upgraded(&contracts);
        assert!(upgraded.proven);
        assert_eq!(upgraded.selector.as_deref(), Some("#signup"));
        assert!(!exp.proven);
    }

    #[test]
    fn test_input_validation_rejects_duplicate_ids() {
        let input = ExpectationInput {
            expectations: vec![
                Expectation::new("e1", "navigation"),
                Expectation::new("e1", "submit"),
            ],
            ..Default::default()
        };
        assert!(matches!(
            input.validate(),
            Err(DomainError::ValidationFailed(msg)) if msg.contains("e1")
        ));

        let empty = ExpectationInput {
            expectations: vec![Expectation::new(" ", "navigation")],
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let flows = ExpectationInput {
            flows: vec![Flow::new("checkout"), Flow::new("checkout")],
            ..Default::default()
        };
        assert!(matches!(
            flows.validate(),
            Err(DomainError::ValidationFailed(msg)) if msg.contains("duplicate flow id")
        ));
    }

    #[test]
    fn test_expectation_deserializes_type_field() {
        let json = r#"{"id":"n1","type":"navigation","promise":{"value":"navigate"},"source":{"file":"a.tsx","line":3}}"#;
        let exp: Expectation = serde_json::from_str(json).unwrap();
        assert_eq!(exp.declared_type.as_deref(), Some("navigation"));
        assert_eq!(exp.promise.value.as_deref(), Some("navigate"));
        assert_eq!(exp.source.key(), "a.tsx:3");
    }
}
