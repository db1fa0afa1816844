//! Domain models for the verification pipeline.

pub mod budget;
pub mod config;
pub mod decision;
pub mod expectation;
pub mod flow;
pub mod interaction;
pub mod observation;
pub mod page;
pub mod trace;
pub mod truth;
pub mod verdict;

pub use budget::{BudgetOverrides, BudgetProfile, RouteAllocation, ScanBudget};
pub use config::{AllocationConfig, Config, FrontierConfig, LoggingConfig, OutputConfig};
pub use decision::{Decision, DecisionPolicy, DecisionStep, ExitCode, FinalVerdict};
pub use expectation::{
    ActionContract, Expectation, ExpectationInput, Promise, PromiseKind, SourceRef,
};
pub use flow::{FailureMode, Flow, FlowStep};
pub use interaction::{FormField, InteractionDescriptor, InteractionKind};
pub use observation::{
    AttemptProof, DomDiff, EvidenceArtifacts, EvidenceSignals, NetworkEvidence, Observation,
    PageState, SignalKind, SilenceRecord, StateComparison, UnattemptedReason,
};
pub use page::{
    ActivityLog, FeedbackMarkers, LoadState, MutationKind, NavigationResponse, PageEvent,
    PageSnapshot, SettleOutcome,
};
pub use trace::{
    DeterminismFactor, FrontierStats, ScanReport, SkipDecision, SkipReason, StepFailure,
    TraceRecord,
};
pub use truth::{
    CoverageSummary, CriticalSilenceKind, ReasonCount, RunSummary, RunTruth, TruthConfidence,
    TruthState, TruthThresholds, INCOMPLETE_SAFETY_STATEMENT,
};
pub use verdict::{round_confidence, FailureClass, Verdict, VerdictStatus};
