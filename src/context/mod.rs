mod carrier;
mod flags;
mod mode;

pub use carrier::{ContextOverrides, RunContext, UnitResult};
pub(crate) use carrier::duration_ms;
pub use flags::{RoutingFlag, USE_TOOLS_FLAG};
pub use mode::CognitiveMode;
