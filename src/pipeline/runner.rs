use super::report::{RunReporter, RunStatus};
use crate::audit::{AuditCategory, SharedAudit};
use crate::config::{FailureMode, RuntimeConfig};
use crate::context::{CognitiveMode, ContextOverrides, RunContext, UnitResult};
use crate::error::{PipelineError, Result};
use crate::observability::{NoopObserver, Observer};
use crate::unit::{ConfiguredUnit, is_inactive};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What the host gets back from a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub output: Value,
    pub unit_results: Vec<UnitResult>,
    pub total_time: Duration,
}

/// Executes an ordered unit list against one run context.
///
/// Units run one at a time in registration order. Fail-fast (the default)
/// aborts on the first validation or execution failure; continue-mode
/// records the failure and hands a null payload to the next unit.
pub struct PipelineRunner {
    units: Vec<ConfiguredUnit>,
    failure_mode: FailureMode,
    timeout: Duration,
    reporter: RunReporter,
}

impl PipelineRunner {
    pub fn new(units: Vec<ConfiguredUnit>) -> Self {
        let runtime = RuntimeConfig::default();
        Self {
            units,
            failure_mode: runtime.failure_mode,
            timeout: runtime.timeout(),
            reporter: RunReporter::new(
                SharedAudit::in_memory(),
                Arc::new(NoopObserver),
                AuditCategory::Pipeline,
            ),
        }
    }

    #[must_use]
    pub fn with_runtime(mut self, runtime: &RuntimeConfig) -> Self {
        self.failure_mode = runtime.failure_mode;
        self.timeout = runtime.timeout();
        self
    }

    #[must_use]
    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_audit(mut self, audit: SharedAudit) -> Self {
        let observer = Arc::clone(self.reporter.observer());
        self.reporter = RunReporter::new(audit, observer, AuditCategory::Pipeline);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        let audit = self.reporter.audit().clone();
        self.reporter = RunReporter::new(audit, observer, AuditCategory::Pipeline);
        self
    }

    pub fn unit_names(&self) -> Vec<String> {
        self.units.iter().map(|u| u.name().to_string()).collect()
    }

    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    /// Run with the configured ceiling.
    pub async fn run(
        &self,
        input: Value,
        mode: CognitiveMode,
        overrides: ContextOverrides,
    ) -> Result<PipelineOutcome> {
        self.run_with_timeout(input, mode, overrides, self.timeout)
            .await
    }

    pub async fn run_with_timeout(
        &self,
        input: Value,
        mode: CognitiveMode,
        overrides: ContextOverrides,
        limit: Duration,
    ) -> Result<PipelineOutcome> {
        let mut ctx = RunContext::new(mode, input.clone(), overrides);
        let started = Instant::now();
        let output = self.execute_with_timeout(&mut ctx, input, limit).await?;
        Ok(PipelineOutcome {
            run_id: ctx.run_id().to_string(),
            output,
            unit_results: ctx.into_results(),
            total_time: started.elapsed(),
        })
    }

    /// Race [`execute`](Self::execute) against `limit`. On expiry the unit in
    /// flight is abandoned and never gets a result.
    pub async fn execute_with_timeout(
        &self,
        ctx: &mut RunContext,
        input: Value,
        limit: Duration,
    ) -> Result<Value> {
        let started = Instant::now();
        let baseline = ctx.results().len();
        if let Ok(result) = tokio::time::timeout(limit, self.execute(ctx, input)).await {
            return result;
        }

        let produced = &ctx.results()[baseline..];
        let in_flight = self.units.get(produced.len()).map(|u| u.name().to_string());
        tracing::warn!(
            run_id = %ctx.run_id(),
            limit_ms = crate::context::duration_ms(limit),
            in_flight = in_flight.as_deref().unwrap_or("none"),
            "pipeline.timeout"
        );
        self.reporter
            .run_finished(ctx, produced, started.elapsed(), RunStatus::TimedOut)
            .await;
        Err(PipelineError::Timeout {
            limit_ms: crate::context::duration_ms(limit),
            in_flight,
        })
    }

    /// Run every unit against an existing context without a ceiling.
    pub async fn execute(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        let started = Instant::now();
        let baseline = ctx.results().len();
        self.reporter.run_started(ctx, &self.unit_names()).await;

        let result = self.execute_units(ctx, input).await;

        let status = if result.is_ok() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        self.reporter
            .run_finished(ctx, &ctx.results()[baseline..], started.elapsed(), status)
            .await;
        result
    }

    async fn execute_units(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        let mut payload = input;

        for configured in &self.units {
            let name = configured.name().to_string();
            let unit = &configured.unit;
            let started = Instant::now();

            let validation_errors = match unit.validate(&payload, ctx).await {
                Ok(report) if report.valid => {
                    for warning in &report.warnings {
                        tracing::warn!(unit = %name, warning = %warning, "unit.validation_warning");
                    }
                    None
                }
                Ok(report) => Some(report.errors),
                Err(error) => Some(vec![format!("{error:#}")]),
            };

            if let Some(errors) = validation_errors {
                let failure = PipelineError::Validation {
                    unit: name.clone(),
                    errors,
                };
                self.record_failure(ctx, &name, &failure, started).await;
                match self.failure_mode {
                    FailureMode::FailFast => return Err(failure),
                    FailureMode::Continue => {
                        payload = Value::Null;
                        continue;
                    }
                }
            }

            match unit.process(payload.clone(), ctx, &configured.config).await {
                Ok(output) => {
                    let result =
                        UnitResult::success(name.clone(), output.clone(), started.elapsed());
                    self.reporter.unit_finished(ctx, &result).await;
                    ctx.record(result);

                    if let Err(error) = unit.finalize(&output, ctx).await {
                        self.reporter.finalize_failed(ctx, &name, &error).await;
                    }

                    if !is_inactive(&output) {
                        payload = output;
                    }
                }
                Err(error) => {
                    let failure = PipelineError::Execution {
                        unit: name.clone(),
                        message: format!("{error:#}"),
                    };
                    self.record_failure(ctx, &name, &failure, started).await;
                    match self.failure_mode {
                        FailureMode::FailFast => return Err(failure),
                        FailureMode::Continue => payload = Value::Null,
                    }
                }
            }
        }

        Ok(payload)
    }

    async fn record_failure(
        &self,
        ctx: &mut RunContext,
        name: &str,
        failure: &PipelineError,
        started: Instant,
    ) {
        tracing::warn!(
            unit = %name,
            error = %failure,
            failure_mode = %self.failure_mode,
            "unit.failed"
        );
        let result = UnitResult::failure(name, failure.to_string(), started.elapsed());
        self.reporter.unit_finished(ctx, &result).await;
        ctx.record(result);
    }
}
