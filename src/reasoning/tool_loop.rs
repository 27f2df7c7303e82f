use super::capability::{CapabilityExecutor, CapabilityOutcome, TrustLevel};
use super::classify::{ErrorDescription, classify};
use super::invocation::ToolInvocationRecord;
use super::parser::{ActionInput, ParsedPlan, PlanParser};
use super::retry::RetryPolicy;
use super::scratchpad::{Scratchpad, ScratchpadEntry};
use super::synthesis::ResponseSynthesizer;
use crate::audit::{AuditCategory, AuditEntry, AuditLevel, SharedAudit};
use crate::config::ReasoningConfig;
use crate::context::{RunContext, duration_ms};
use crate::generation::{ChatMessage, GenerationRequest, GenerationRole, GenerationService};
use crate::observability::{NoopObserver, Observer, ObserverEvent, ObserverMetric};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    FinalAnswer,
    MaxIterations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningOutcome {
    pub answer: String,
    pub scratchpad: Scratchpad,
    pub iterations: u32,
    pub stop_reason: StopReason,
    pub invocations: Vec<ToolInvocationRecord>,
    /// Plain-language explanations of capability calls that could not succeed.
    pub terminal_failures: Vec<String>,
}

/// Loop phases. PLAN → ACT → OBSERVE → CHECK_COMPLETE → PLAN, or
/// PLAN → CHECK_COMPLETE directly when the plan holds a final answer.
#[derive(Debug)]
enum Phase {
    Plan,
    Act {
        thought: Option<String>,
        action: String,
        args: Value,
    },
    Observe(ScratchpadEntry),
    CheckComplete,
}

/// Result of the ACT phase after any retries.
struct ActResult {
    observation: String,
    terminal_failure: Option<String>,
}

/// Bounded plan/act/observe reasoning over trust-gated capabilities.
pub struct ReasoningLoop {
    generation: Arc<dyn GenerationService>,
    capabilities: Arc<dyn CapabilityExecutor>,
    audit: SharedAudit,
    observer: Arc<dyn Observer>,
    config: ReasoningConfig,
    retry: RetryPolicy,
}

impl ReasoningLoop {
    pub fn new(
        generation: Arc<dyn GenerationService>,
        capabilities: Arc<dyn CapabilityExecutor>,
        config: ReasoningConfig,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            generation,
            capabilities,
            audit: SharedAudit::in_memory(),
            observer: Arc::new(NoopObserver),
            config,
            retry,
        }
    }

    #[must_use]
    pub fn with_audit(mut self, audit: SharedAudit) -> Self {
        self.audit = audit;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }

    /// Copy of this loop with a different iteration budget.
    #[must_use]
    pub fn with_max_iterations(&self, max_iterations: u32) -> Self {
        let config = ReasoningConfig {
            max_iterations,
            ..self.config.clone()
        };
        Self {
            generation: Arc::clone(&self.generation),
            capabilities: Arc::clone(&self.capabilities),
            audit: self.audit.clone(),
            observer: Arc::clone(&self.observer),
            retry: self.retry,
            config,
        }
    }

    pub async fn run(&self, question: &str, ctx: &RunContext) -> anyhow::Result<ReasoningOutcome> {
        let max_iterations = self.config.effective_max_iterations();
        let trust = self.config.trust_level;
        let mut scratchpad = Scratchpad::new();
        let mut invocations = Vec::new();
        let mut terminal_failures = Vec::new();
        let mut iterations = 0_u32;
        let mut completed = false;
        let mut phase = Phase::Plan;

        tracing::info!(
            run_id = %ctx.run_id(),
            max_iterations,
            trust = %trust,
            "reasoning.start"
        );

        loop {
            phase = match phase {
                Phase::Plan => {
                    if iterations >= max_iterations {
                        break;
                    }
                    if iterations > 0 && !self.config.iteration_delay().is_zero() {
                        tokio::time::sleep(self.config.iteration_delay()).await;
                    }
                    iterations += 1;

                    let text = self.plan(question, &scratchpad, ctx).await?;
                    match PlanParser::parse(&text) {
                        ParsedPlan::FinalAnswer { thought, answer } => {
                            scratchpad.push(ScratchpadEntry::FinalAnswer { thought, answer });
                            Phase::CheckComplete
                        }
                        ParsedPlan::Action {
                            thought,
                            action,
                            input: ActionInput::Args(args),
                        } => Phase::Act {
                            thought,
                            action,
                            args,
                        },
                        ParsedPlan::Action {
                            thought,
                            action,
                            input: ActionInput::Invalid { raw, error },
                        } => {
                            tracing::debug!(
                                action = %action,
                                error = %error,
                                "reasoning.invalid_args"
                            );
                            Phase::Observe(ScratchpadEntry::Step {
                                thought,
                                action,
                                input: Value::String(raw),
                                observation: format!(
                                    "Error (invalid-args): {error}. \
                                     Provide a JSON object after Action Input."
                                ),
                            })
                        }
                        ParsedPlan::Malformed { reason } => {
                            tracing::debug!(reason = %reason, "reasoning.malformed_plan");
                            scratchpad.push(ScratchpadEntry::Note {
                                thought: text.trim().to_string(),
                            });
                            Phase::CheckComplete
                        }
                    }
                }
                Phase::Act {
                    thought,
                    action,
                    args,
                } => {
                    let result = self
                        .act(&action, &args, trust, iterations, ctx, &mut invocations)
                        .await;
                    if let Some(failure) = result.terminal_failure {
                        terminal_failures.push(failure);
                    }
                    Phase::Observe(ScratchpadEntry::Step {
                        thought,
                        action,
                        input: args,
                        observation: result.observation,
                    })
                }
                Phase::Observe(entry) => {
                    scratchpad.push(entry);
                    Phase::CheckComplete
                }
                Phase::CheckComplete => {
                    if scratchpad.final_answer().is_some() {
                        completed = true;
                        break;
                    }
                    Phase::Plan
                }
            };
        }

        let stop_reason = if completed {
            StopReason::FinalAnswer
        } else {
            StopReason::MaxIterations
        };
        self.observer
            .record_metric(&ObserverMetric::ReasoningIterations(u64::from(iterations)));

        let synthesizer =
            ResponseSynthesizer::new(Arc::clone(&self.generation), self.config.persona_voice);
        let mut answer = synthesizer
            .synthesize(question, &scratchpad, ctx.mode())
            .await?;
        append_failures(&mut answer, &terminal_failures);

        tracing::info!(
            run_id = %ctx.run_id(),
            iterations,
            stop_reason = %stop_reason,
            invocations = invocations.len(),
            "reasoning.complete"
        );

        self.audit
            .capture_event(
                &scratchpad.render(),
                json!({
                    "kind": "scratchpad",
                    "run_id": ctx.run_id(),
                    "conversation_id": ctx.session_id(),
                    "iterations": iterations,
                    "stop_reason": stop_reason,
                    "entries": scratchpad.entries(),
                }),
            )
            .await;

        Ok(ReasoningOutcome {
            answer,
            scratchpad,
            iterations,
            stop_reason,
            invocations,
            terminal_failures,
        })
    }

    async fn plan(
        &self,
        question: &str,
        scratchpad: &Scratchpad,
        ctx: &RunContext,
    ) -> anyhow::Result<String> {
        let catalog = self
            .capabilities
            .descriptors()
            .iter()
            .map(|d| format!("- {}: {}", d.id, d.description))
            .collect::<Vec<_>>()
            .join("\n");
        let system = format!(
            "You can use these capabilities:\n{catalog}\n\n{}",
            PlanParser::format_prompt()
        );
        let mut user = format!("Question: {question}");
        if !scratchpad.is_empty() {
            user.push_str("\n\n");
            user.push_str(&scratchpad.render());
        }

        let request = GenerationRequest::new(
            GenerationRole::Planner,
            ctx.mode(),
            vec![ChatMessage::system(system), ChatMessage::user(user)],
        );
        Ok(self.generation.generate(request).await?.content)
    }

    /// Invoke `action`, retrying retryable failures with unchanged arguments.
    async fn act(
        &self,
        action: &str,
        args: &Value,
        trust: TrustLevel,
        iteration: u32,
        ctx: &RunContext,
        invocations: &mut Vec<ToolInvocationRecord>,
    ) -> ActResult {
        let mut retries = 0_u32;
        loop {
            let attempt = retries + 1;
            let started = Instant::now();
            let outcome = self
                .capabilities
                .execute(action, args.clone(), trust)
                .await;
            let elapsed = started.elapsed();

            let classification = (!outcome.success).then(|| {
                classify(&ErrorDescription::new(
                    action,
                    outcome.error.clone().unwrap_or_default(),
                ))
            });

            let record = ToolInvocationRecord {
                id: uuid::Uuid::new_v4().to_string(),
                capability: action.to_string(),
                args: args.clone(),
                outputs: outcome.outputs.clone(),
                success: outcome.success,
                error: outcome.error.clone(),
                execution_ms: duration_ms(elapsed),
                conversation_id: ctx.session_id().to_string(),
                run_id: ctx.run_id().to_string(),
                iteration,
                attempt,
                category: classification.as_ref().map(|c| c.category),
                recorded_at: Utc::now(),
            };
            self.capture_invocation(&record).await;
            self.observer.record_event(&ObserverEvent::CapabilityCall {
                capability: action.to_string(),
                duration: elapsed,
                success: outcome.success,
                attempt,
            });
            invocations.push(record);

            let Some(classification) = classification else {
                return ActResult {
                    observation: render_outputs(&outcome),
                    terminal_failure: None,
                };
            };

            if classification.retryable && self.retry.allows_retry(retries) {
                let backoff = self.retry.backoff(retries);
                tracing::info!(
                    capability = %action,
                    category = %classification.category,
                    attempt,
                    backoff_ms = duration_ms(backoff),
                    "reasoning.retry"
                );
                self.observer.record_metric(&ObserverMetric::RetryAttempt {
                    capability: action.to_string(),
                    attempt: attempt + 1,
                    backoff,
                });
                tokio::time::sleep(backoff).await;
                retries += 1;
                continue;
            }

            let description =
                ErrorDescription::new(action, outcome.error.clone().unwrap_or_default());
            let mut explanation = classification.user_message(&description);
            if classification.retryable {
                explanation.push_str(&format!(" (gave up after {attempt} attempts)"));
            }
            tracing::warn!(
                capability = %action,
                category = %classification.category,
                retryable = classification.retryable,
                attempts = attempt,
                "reasoning.capability_failed"
            );
            return ActResult {
                observation: format!(
                    "Error ({}): {}",
                    classification.category, description.message
                ),
                terminal_failure: Some(explanation),
            };
        }
    }

    async fn capture_invocation(&self, record: &ToolInvocationRecord) {
        let details = serde_json::to_value(record).unwrap_or(Value::Null);
        let level = if record.success {
            AuditLevel::Info
        } else {
            AuditLevel::Warn
        };
        self.audit
            .audit(
                AuditEntry::new(AuditCategory::Capability, "capability.invoke", details)
                    .with_level(level)
                    .with_actor("reasoning"),
            )
            .await;
    }
}

fn render_outputs(outcome: &CapabilityOutcome) -> String {
    match &outcome.outputs {
        Value::String(text) => text.clone(),
        Value::Null => "(no output)".to_string(),
        other => other.to_string(),
    }
}

/// Terminal failures always reach the user, even under a final answer.
fn append_failures(answer: &mut String, failures: &[String]) {
    let missing: Vec<&String> = failures
        .iter()
        .filter(|failure| !answer.contains(failure.as_str()))
        .collect();
    if missing.is_empty() {
        return;
    }
    if !answer.is_empty() {
        answer.push_str("\n\n");
    }
    let joined = missing
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    answer.push_str(&joined);
}
