use super::tool_loop::{ReasoningLoop, ReasoningOutcome};
use crate::context::{RunContext, USE_TOOLS_FLAG};
use crate::graph::{NodeExecutor, NodeInputs};
use crate::unit::{ExecutionUnit, ValidationReport, extract_text, inactive_output};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

/// Per-unit overrides read from the static config block.
fn configured_loop(base: &Arc<ReasoningLoop>, config: &Value) -> Arc<ReasoningLoop> {
    match config
        .get("max_iterations")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
    {
        Some(max) if max > 0 => Arc::new(base.with_max_iterations(max)),
        _ => Arc::clone(base),
    }
}

fn question_for<'a>(input: Option<&'a Value>, ctx: &'a RunContext) -> Option<&'a str> {
    input
        .and_then(extract_text)
        .or_else(|| ctx.user_message())
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn outcome_payload(outcome: &ReasoningOutcome) -> Value {
    json!({
        "response": outcome.answer,
        "reasoning": {
            "iterations": outcome.iterations,
            "stop_reason": outcome.stop_reason,
            "invocations": outcome.invocations.len(),
            "terminal_failures": outcome.terminal_failures,
        },
    })
}

/// Linear-runner adapter. Stands down when tool use is explicitly off.
pub struct ReasoningUnit {
    reasoning: Arc<ReasoningLoop>,
}

impl ReasoningUnit {
    pub const NAME: &'static str = "reasoning";

    pub fn new(reasoning: Arc<ReasoningLoop>) -> Self {
        Self { reasoning }
    }
}

#[async_trait]
impl ExecutionUnit for ReasoningUnit {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn validate(&self, input: &Value, ctx: &RunContext) -> anyhow::Result<ValidationReport> {
        if ctx.flag(USE_TOOLS_FLAG).contradicts(true) {
            return Ok(ValidationReport::valid());
        }
        if question_for(Some(input), ctx).is_none() {
            return Ok(ValidationReport::invalid("no question to reason about"));
        }
        Ok(ValidationReport::valid())
    }

    async fn process(
        &self,
        input: Value,
        ctx: &mut RunContext,
        config: &Value,
    ) -> anyhow::Result<Value> {
        if ctx.flag(USE_TOOLS_FLAG).contradicts(true) {
            return Ok(inactive_output());
        }
        let Some(question) = question_for(Some(&input), ctx).map(str::to_string) else {
            anyhow::bail!("no question to reason about");
        };
        let outcome = configured_loop(&self.reasoning, config)
            .run(&question, ctx)
            .await?;
        Ok(outcome_payload(&outcome))
    }
}

/// Graph adapter. Reads the question from the first live input slot and
/// stands down when its branch is off or tool use is explicitly disabled.
pub struct ReasoningNode {
    reasoning: Arc<ReasoningLoop>,
}

impl ReasoningNode {
    pub const NODE_TYPE: &'static str = "reasoning";

    pub fn new(reasoning: Arc<ReasoningLoop>) -> Self {
        Self { reasoning }
    }
}

#[async_trait]
impl NodeExecutor for ReasoningNode {
    fn node_type(&self) -> &str {
        Self::NODE_TYPE
    }

    async fn execute(
        &self,
        inputs: &NodeInputs,
        ctx: &mut RunContext,
        config: &Value,
    ) -> anyhow::Result<Value> {
        if inputs.branch_inactive() || ctx.flag(USE_TOOLS_FLAG).contradicts(true) {
            return Ok(inactive_output());
        }
        let Some(question) = question_for(inputs.first_live(), ctx).map(str::to_string)
        else {
            anyhow::bail!("reasoning node received no question");
        };
        let outcome = configured_loop(&self.reasoning, config)
            .run(&question, ctx)
            .await?;
        Ok(outcome_payload(&outcome))
    }
}
