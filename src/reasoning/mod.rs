//! Tool-use reasoning: a bounded plan/act/observe loop over trust-gated
//! capabilities, with categorized retry and a durable invocation trail.

pub mod adapters;
pub mod capability;
pub mod classify;
pub mod invocation;
pub mod parser;
pub mod retry;
pub mod scratchpad;
pub mod synthesis;
pub mod tool_loop;

pub use adapters::{ReasoningNode, ReasoningUnit};
pub use capability::{
    Capability, CapabilityDescriptor, CapabilityExecutor, CapabilityOutcome, CapabilityRegistry,
    TrustLevel,
};
pub use classify::{ErrorCategory, ErrorClassification, ErrorDescription, classify};
pub use invocation::ToolInvocationRecord;
pub use parser::{ActionInput, ParsedPlan, PlanParser};
pub use retry::RetryPolicy;
pub use scratchpad::{Scratchpad, ScratchpadEntry};
pub use synthesis::ResponseSynthesizer;
pub use tool_loop::{ReasoningLoop, ReasoningOutcome, StopReason};
