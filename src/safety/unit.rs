use super::checks::Candidate;
use super::gate::{GateOutcome, SafetyGate};
use super::policy::{ValidationLevel, ValidationPolicy};
use crate::config::ConfigHandle;
use crate::context::RunContext;
use crate::unit::{ExecutionUnit, extract_text, replace_text};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

/// Returned in place of a candidate that failed the safety check.
pub const WITHHELD_RESPONSE: &str =
    "I can't share that response. Could you rephrase or ask something else?";

/// Runs the gate over the upstream payload's response text.
///
/// The policy comes from the current mode's config; a unit config block may
/// override the level, e.g. `{ "level": "quick" }`.
pub struct SafetyGateUnit {
    gate: Arc<SafetyGate>,
    config: ConfigHandle,
}

impl SafetyGateUnit {
    pub const NAME: &'static str = "safety_gate";

    pub fn new(gate: Arc<SafetyGate>, config: ConfigHandle) -> Self {
        Self { gate, config }
    }

    fn policy(&self, ctx: &RunContext, unit_config: &Value) -> ValidationPolicy {
        let mut policy = self
            .config
            .load()
            .modes
            .get(ctx.mode())
            .map_or_else(ValidationPolicy::pass_through, |mode| mode.validation.clone());
        if let Some(level) = unit_config
            .get("level")
            .and_then(|level| serde_json::from_value::<ValidationLevel>(level.clone()).ok())
        {
            policy.level = level;
        }
        policy
    }
}

/// Earlier active outputs of this run, used as consistency context.
fn context_snippets(ctx: &RunContext, candidate: &str) -> Vec<String> {
    ctx.results()
        .iter()
        .filter(|result| result.success && !result.inactive)
        .filter_map(|result| result.output.as_ref().and_then(extract_text))
        .filter(|text| *text != candidate)
        .map(str::to_string)
        .collect()
}

fn gated_payload(input: &Value, outcome: &GateOutcome, text: &str) -> anyhow::Result<Value> {
    let mut payload = match input {
        Value::Object(_) => replace_text(input, text),
        _ => json!({ "response": text }),
    };
    if let Value::Object(map) = &mut payload {
        map.insert("validation".to_string(), serde_json::to_value(outcome)?);
    }
    Ok(payload)
}

#[async_trait]
impl ExecutionUnit for SafetyGateUnit {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn process(
        &self,
        input: Value,
        ctx: &mut RunContext,
        config: &Value,
    ) -> anyhow::Result<Value> {
        let Some(text) = extract_text(&input).map(str::to_string) else {
            tracing::debug!(run_id = %ctx.run_id(), "safety.no_candidate");
            return Ok(input);
        };

        let policy = self.policy(ctx, config);
        let mut candidate = Candidate::new(text.clone());
        candidate.question = ctx.user_message().map(str::to_string);
        candidate.context = context_snippets(ctx, &text);

        let outcome = self.gate.evaluate(&candidate, &policy, ctx.mode()).await;
        let safety_failed = outcome
            .validation
            .safety
            .as_ref()
            .is_some_and(|result| !result.passed);
        let delivered = if !outcome.passed && safety_failed && !policy.allow_unsafe {
            tracing::warn!(run_id = %ctx.run_id(), "safety.withheld");
            WITHHELD_RESPONSE
        } else {
            outcome.final_text.as_str()
        };

        gated_payload(&input, &outcome, delivered)
    }
}
