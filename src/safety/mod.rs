//! Multi-check validation gate: safety, value alignment and consistency,
//! with refinement of failed candidates.

pub mod checks;
pub mod gate;
pub mod heuristics;
pub mod policy;
pub mod refiner;
pub mod unit;

pub use checks::{Candidate, CheckKind, CheckResult, ContentCheck, LlmCheck, Verdict, parse_verdict};
pub use gate::{CheckSet, GateOutcome, SafetyGate, ValidationOutcome, decide};
pub use heuristics::{HeuristicAlignment, HeuristicConsistency, HeuristicSafety};
pub use policy::{ValidationLevel, ValidationPolicy};
pub use refiner::{Refinement, Refiner};
pub use unit::{SafetyGateUnit, WITHHELD_RESPONSE};
