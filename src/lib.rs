#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod audit;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod generation;
pub mod graph;
#[doc(hidden)]
pub mod observability;
pub mod pipeline;
pub mod reasoning;
pub mod safety;
pub mod unit;


pub use config::{ConfigHandle, PipelineConfig};
pub use context::{CognitiveMode, ContextOverrides, RunContext, UnitResult};
pub use engine::{CognitiveEngine, EngineBuilder, RunOutput};
pub use error::{ConfigError, GraphError, PipelineError, Result};
