//! Interaction descriptors discovered on a page.

use serde::{Deserialize, Serialize};

/// The kind of user interaction the driver can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Link,
    Button,
    Form,
    Hover,
    Keyboard,
    FileUpload,
    Login,
    Logout,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Button => "button",
            Self::Form => "form",
            Self::Hover => "hover",
            Self::Keyboard => "keyboard",
            Self::FileUpload => "file_upload",
            Self::Login => "login",
            Self::Logout => "logout",
        }
    }

    /// Scheduling rank within a page: links, then buttons, then forms, then
    /// everything else.
    pub fn priority_rank(&self) -> u8 {
        match self {
            Self::Link => 0,
            Self::Button => 1,
            Self::Form => 2,
            Self::Hover | Self::Keyboard | Self::FileUpload | Self::Login | Self::Logout => 3,
        }
    }

    /// Auth affordances are exempt from the destructive-action filter.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Login | Self::Logout)
    }

    /// Whether performing this interaction submits a form.
    pub fn submits_form(&self) -> bool {
        matches!(self, Self::Form | Self::Login)
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single form field to fill before submitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub selector: String,
    pub value: String,
}

/// One interaction discovered on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionDescriptor {
    pub kind: InteractionKind,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// Fields to fill for form and login interactions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FormField>,
    /// Element clicked to submit a form; the form selector itself when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_selector: Option<String>,
    /// Key pressed for keyboard interactions (defaults to `Enter`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Files attached for upload interactions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl InteractionDescriptor {
    pub fn new(kind: InteractionKind, selector: impl Into<String>) -> Self {
        Self {
            kind,
            selector: selector.into(),
            text: None,
            label: None,
            aria_label: None,
            href: None,
            fields: Vec::new(),
            submit_selector: None,
            key: None,
            files: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_aria_label(mut self, aria_label: impl Into<String>) -> Self {
        self.aria_label = Some(aria_label.into());
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_field(mut self, selector: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(FormField {
            selector: selector.into(),
            value: value.into(),
        });
        self
    }

    /// Text, label and aria-label joined into one string for keyword checks.
    pub fn combined_label(&self) -> String {
        [&self.text, &self.label, &self.aria_label]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_label_skips_missing_parts() {
        let interaction = InteractionDescriptor::new(InteractionKind::Button, "#del")
            .with_text("Delete")
            .with_aria_label("delete account");
        assert_eq!(interaction.combined_label(), "Delete delete account");
    }

    #[test]
    fn test_priority_rank_orders_links_first() {
        assert!(InteractionKind::Link.priority_rank() < InteractionKind::Button.priority_rank());
        assert!(InteractionKind::Button.priority_rank() < InteractionKind::Form.priority_rank());
        assert_eq!(
            InteractionKind::Hover.priority_rank(),
            InteractionKind::Logout.priority_rank()
        );
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&InteractionKind::FileUpload).unwrap();
        assert_eq!(json, "\"file_upload\"");
    }
}
