//! Decision authority: one final verdict and exit code per run.
//!
//! Rules are evaluated in order until one matches. Every evaluated rule is
//! recorded in the decision's provenance, matched or not.

use tracing::info;

use crate::domain::models::{
    Decision, DecisionPolicy, DecisionStep, FinalVerdict, RunSummary, RunTruth, TruthState,
};

/// Merges run truth, coverage and policy into a [`Decision`].
#[derive(Debug, Clone, Default)]
pub struct DecisionAuthority {
    policy: DecisionPolicy,
}

impl DecisionAuthority {
    pub fn new(policy: DecisionPolicy) -> Self {
        Self { policy }
    }

    pub fn decide(&self, truth: &RunTruth, summary: &RunSummary) -> Decision {
        let mut provenance = Vec::new();
        let verdict = self.evaluate(truth, summary, &mut provenance);

        info!(
            verdict = verdict.as_str(),
            truth = truth.truth_state.as_str(),
            exit_code = verdict.exit_code().code(),
            "final decision"
        );

        Decision {
            verdict,
            truth_state: truth.truth_state,
            exit_code: verdict.exit_code().code(),
            provenance,
        }
    }

    fn evaluate(
        &self,
        truth: &RunTruth,
        summary: &RunSummary,
        provenance: &mut Vec<DecisionStep>,
    ) -> FinalVerdict {
        let incomplete = truth.truth_state == TruthState::Incomplete;
        if incomplete && self.policy.allow_incomplete && !summary.infrastructure_failure {
            provenance.push(step(
                "incomplete_run",
                true,
                "INCOMPLETE accepted as READY by allow_incomplete policy",
            ));
            return FinalVerdict::Ready;
        }
        let detail = match (incomplete, summary.infrastructure_failure) {
            (true, true) if self.policy.allow_incomplete => {
                "infrastructure failure: allow_incomplete does not apply"
            }
            (true, true) => "infrastructure failure: the run could not be verified",
            (true, false) => "run is INCOMPLETE and must not be treated as safe",
            (false, _) => "run is not INCOMPLETE",
        };
        provenance.push(step("incomplete_run", incomplete, detail));
        if incomplete {
            return FinalVerdict::Concern;
        }

        let findings = truth.truth_state == TruthState::Findings;
        provenance.push(step(
            "confirmed_findings",
            findings,
            &format!("{} confirmed silent failure(s)", summary.silent_failures),
        ));
        if findings {
            return FinalVerdict::Fail;
        }

        let strict = self.policy.strict_suspected && summary.suspected > 0;
        provenance.push(step(
            "strict_suspected",
            strict,
            &if self.policy.strict_suspected {
                format!("{} suspected verdict(s) under strict policy", summary.suspected)
            } else {
                "strict_suspected policy disabled".to_string()
            },
        ));
        if strict {
            return FinalVerdict::Concern;
        }

        provenance.push(step("default_ready", true, "no blocking condition"));
        FinalVerdict::Ready
    }
}

fn step(rule: &str, matched: bool, detail: &str) -> DecisionStep {
    DecisionStep {
        rule: rule.to_string(),
        matched,
        detail: detail.to_string(),
    }
}
