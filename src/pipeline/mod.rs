pub mod report;
pub mod runner;

pub use report::{RunReporter, RunStatus};
pub use runner::{PipelineOutcome, PipelineRunner};
