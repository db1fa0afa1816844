//! Declared user flows: ordered interaction steps run from a fixed page.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::interaction::{FormField, InteractionDescriptor, InteractionKind};

/// What happens to the rest of the run when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Stop executing flows.
    #[default]
    Abort,
    /// Record the failure and move on to the next step.
    Continue,
}

impl FailureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Continue => "continue",
        }
    }
}

/// One step of a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    pub action: InteractionKind,
    #[serde(default)]
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FormField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    /// Expectation judged by this step's outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectation: Option<String>,
    #[serde(default)]
    pub failure_mode: FailureMode,
}

impl FlowStep {
    pub fn new(action: InteractionKind, selector: impl Into<String>) -> Self {
        Self {
            action,
            selector: selector.into(),
            text: None,
            fields: Vec::new(),
            submit_selector: None,
            key: None,
            files: Vec::new(),
            expectation: None,
            failure_mode: FailureMode::Abort,
        }
    }

    pub fn expecting(mut self, expectation_id: impl Into<String>) -> Self {
        self.expectation = Some(expectation_id.into());
        self
    }

    pub fn continue_on_failure(mut self) -> Self {
        self.failure_mode = FailureMode::Continue;
        self
    }

    pub fn with_field(mut self, selector: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(FormField {
            selector: selector.into(),
            value: value.into(),
        });
        self
    }

    /// Checks a step right before it runs. A failure rejects this step only.
    pub fn validate(&self, known_expectations: &HashSet<&str>) -> DomainResult<()> {
        if self.selector.trim().is_empty() {
            return Err(DomainError::ValidationFailed(format!(
                "{} step has no selector",
                self.action
            )));
        }
        if self.action == InteractionKind::FileUpload && self.files.is_empty() {
            return Err(DomainError::ValidationFailed(
                "file_upload step lists no files".to_string(),
            ));
        }
        if let Some(field) = self.fields.iter().find(|f| f.selector.trim().is_empty()) {
            return Err(DomainError::ValidationFailed(format!(
                "form field with value '{}' has no selector",
                field.value
            )));
        }
        if let Some(id) = self.expectation.as_deref() {
            if !known_expectations.contains(id) {
                return Err(DomainError::ValidationFailed(format!(
                    "step references unknown expectation '{id}'"
                )));
            }
        }
        Ok(())
    }

    pub fn interaction(&self) -> InteractionDescriptor {
        InteractionDescriptor {
            text: self.text.clone(),
            fields: self.fields.clone(),
            submit_selector: self.submit_selector.clone(),
            key: self.key.clone(),
            files: self.files.clone(),
            ..InteractionDescriptor::new(self.action, self.selector.clone())
        }
    }
}

/// A named sequence of steps. Steps run in order without restoring the
/// page between them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    /// Page the flow starts from, resolved against the start URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

impl Flow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: None,
            steps: Vec::new(),
        }
    }

    pub fn at(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn step(mut self, step: FlowStep) -> Self {
        self.steps.push(step);
        self
    }
}
