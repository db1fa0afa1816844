//! Verification pipeline services.

pub mod budget_engine;
pub mod decision_authority;
pub mod evidence_law;
pub mod frontier;
pub mod interaction_driver;
pub mod safety_gate;
pub mod scan_orchestrator;
pub mod silent_failure;
pub mod stabilization;
pub mod truth_classifier;

pub use budget_engine::{BudgetEngine, RouteSpec};
pub use decision_authority::DecisionAuthority;
pub use frontier::{canonicalize, canonicalize_with, CrawlFrontier};
pub use interaction_driver::{prioritize, InteractionDriver, InteractionOutcome};
pub use safety_gate::SafetyGate;
pub use scan_orchestrator::ScanOrchestrator;
pub use stabilization::{settle, StabilizationEngine};
