//! Final run decision and process exit codes.

use serde::{Deserialize, Serialize};

use super::truth::TruthState;

/// Process exit codes. The mapping from [`FinalVerdict`] is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCode {
    Success,
    Findings,
    Incomplete,
    InvalidInput,
    Internal,
}

impl ExitCode {
    pub fn code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Findings => 20,
            Self::Incomplete => 30,
            Self::InvalidInput => 64,
            Self::Internal => 70,
        }
    }
}

/// Launch-readiness verdict consumed by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalVerdict {
    Ready,
    Concern,
    Fail,
}

impl FinalVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Concern => "CONCERN",
            Self::Fail => "FAIL",
        }
    }

    /// Long-form label used in human output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Concern => "CONCERN / FRICTION",
            Self::Fail => "FAIL / DO NOT LAUNCH",
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Ready => ExitCode::Success,
            Self::Fail => ExitCode::Findings,
            Self::Concern => ExitCode::Incomplete,
        }
    }
}

impl std::fmt::Display for FinalVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional policy signals merged by the decision authority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DecisionPolicy {
    /// Treat SUSPECTED verdicts on an otherwise successful run as a concern.
    #[serde(default)]
    pub strict_suspected: bool,
    /// Accept an INCOMPLETE run as READY. Recorded in provenance. Never
    /// applies to a run with an infrastructure failure.
    #[serde(default)]
    pub allow_incomplete: bool,
}

/// One rule evaluated while reaching the decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionStep {
    pub rule: String,
    pub matched: bool,
    pub detail: String,
}

/// The final run verdict with full provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub verdict: FinalVerdict,
    pub truth_state: TruthState,
    pub exit_code: i32,
    pub provenance: Vec<DecisionStep>,
}
