//! Destructive-action safety gate.
//!
//! Runs before any interaction is attempted. A withheld interaction is a
//! skip, never an error.

use regex::Regex;
use tracing::info;

use crate::domain::models::{InteractionDescriptor, SkipDecision, SkipReason};

/// Keyword filter over an interaction's text, label and aria-label.
#[derive(Debug, Clone)]
pub struct SafetyGate {
    destructive: Regex,
    financial: Regex,
    sensitive_clear: Regex,
    safe_clear: Regex,
    clear: Regex,
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyGate {
    pub fn new() -> Self {
        Self {
            destructive: Regex::new(
                r"\b(delete|remove|erase|wipe|destroy|drop|reset|terminate|unsubscribe|deactivate)\b",
            )
            .expect("static pattern"),
            financial: Regex::new(r"\b(pay|purchase|checkout)\b").expect("static pattern"),
            sensitive_clear: Regex::new(
                r"\bclear\s+(all\s+)?(data|account|all|history|cache|everything|storage|cookies)\b",
            )
            .expect("static pattern"),
            safe_clear: Regex::new(r"\bclear\s+(filters?|search|selection|form|input|query|text|field)\b")
                .expect("static pattern"),
            clear: Regex::new(r"\bclear\b").expect("static pattern"),
        }
    }

    /// Decide whether `interaction` must be withheld.
    ///
    /// Login and logout affordances bypass the destructive filters so auth
    /// flows stay testable. Financial actions are always withheld.
    pub fn should_skip(&self, interaction: &InteractionDescriptor) -> SkipDecision {
        let label = interaction.combined_label().to_lowercase();
        let decision = self.evaluate(&label, interaction.kind.is_auth());
        if decision.skip {
            info!(
                selector = %interaction.selector,
                reason = decision.reason.map(|r| r.as_str()),
                "interaction withheld by safety gate"
            );
        }
        decision
    }

    fn evaluate(&self, label: &str, is_auth: bool) -> SkipDecision {
        if let Some(m) = self.financial.find(label) {
            return SkipDecision::block(SkipReason::Financial, m.as_str());
        }
        if is_auth {
            return SkipDecision::allow();
        }
        if let Some(m) = self.sensitive_clear.find(label) {
            return SkipDecision::block(SkipReason::SensitiveClear, m.as_str());
        }
        if let Some(m) = self.destructive.find(label) {
            return SkipDecision::block(SkipReason::Destructive, m.as_str());
        }
        if let Some(m) = self.clear.find(label) {
            if !self.safe_clear.is_match(label) {
                return SkipDecision::block(SkipReason::Destructive, m.as_str());
            }
        }
        SkipDecision::allow()
    }
}
