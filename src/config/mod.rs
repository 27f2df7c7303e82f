pub mod hot_reload;
mod loader;
pub mod schema;

pub use hot_reload::ConfigHandle;
pub use schema::{
    ExecutionStrategy, FailureMode, ModeConfig, ModesConfig, ObservabilityConfig, PipelineConfig,
    REASONING_ITERATION_HARD_CAP, ReasoningConfig, RuntimeConfig, UnitConfig,
};
