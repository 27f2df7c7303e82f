use crate::context::RunContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a unit's pre-check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// One processing step of a linear pipeline.
///
/// Returning [`inactive_output`](super::inactive_output) from `process` marks
/// the unit as not applicable for this run; the runner records it and keeps
/// the previous payload flowing downstream.
#[async_trait]
pub trait ExecutionUnit: Send + Sync {
    /// Unique name within one mode's unit list.
    fn name(&self) -> &str;

    /// Semantic version of the unit implementation.
    fn version(&self) -> &str {
        "0.1.0"
    }

    /// Optional pre-check. The default accepts every input.
    async fn validate(
        &self,
        _input: &Value,
        _ctx: &RunContext,
    ) -> anyhow::Result<ValidationReport> {
        Ok(ValidationReport::valid())
    }

    /// Required processing step.
    async fn process(
        &self,
        input: Value,
        ctx: &mut RunContext,
        config: &Value,
    ) -> anyhow::Result<Value>;

    /// Side effect run after the result has been recorded. Failures here are
    /// logged and audited but never affect the run.
    async fn finalize(&self, _output: &Value, _ctx: &RunContext) -> anyhow::Result<()> {
        Ok(())
    }
}
