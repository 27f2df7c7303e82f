use crate::audit::{AuditCategory, AuditEntry, AuditLevel, SharedAudit};
use crate::context::{RunContext, UnitResult, duration_ms};
use crate::observability::{Observer, ObserverEvent, ObserverMetric};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// How a run ended, as written to the completion audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    TimedOut,
}

/// Emits the start / per-unit / completion trail shared by the linear runner
/// and the graph runtime.
#[derive(Clone)]
pub struct RunReporter {
    audit: SharedAudit,
    observer: Arc<dyn Observer>,
    category: AuditCategory,
}

impl RunReporter {
    pub fn new(audit: SharedAudit, observer: Arc<dyn Observer>, category: AuditCategory) -> Self {
        Self {
            audit,
            observer,
            category,
        }
    }

    pub fn audit(&self) -> &SharedAudit {
        &self.audit
    }

    pub fn observer(&self) -> &Arc<dyn Observer> {
        &self.observer
    }

    pub async fn run_started(&self, ctx: &RunContext, names: &[String]) {
        tracing::info!(
            run_id = %ctx.run_id(),
            mode = %ctx.mode(),
            units = names.len(),
            "pipeline.start"
        );
        self.observer.record_event(&ObserverEvent::RunStart {
            run_id: ctx.run_id().to_string(),
            mode: ctx.mode().to_string(),
            units: names.len(),
        });
        self.audit
            .audit(AuditEntry::new(
                self.category,
                "pipeline.start",
                json!({
                    "run_id": ctx.run_id(),
                    "session_id": ctx.session_id(),
                    "mode": ctx.mode(),
                    "unit_count": names.len(),
                    "units": names,
                }),
            ))
            .await;
    }

    pub async fn unit_finished(&self, ctx: &RunContext, result: &UnitResult) {
        let duration = Duration::from_millis(result.duration_ms);
        self.observer.record_event(&ObserverEvent::UnitEnd {
            unit: result.unit.clone(),
            duration,
            success: result.success,
            inactive: result.inactive,
        });
        self.observer.record_metric(&ObserverMetric::UnitLatency {
            unit: result.unit.clone(),
            duration,
        });

        let level = if result.success {
            AuditLevel::Info
        } else {
            AuditLevel::Error
        };
        self.audit
            .audit(
                AuditEntry::new(
                    self.category,
                    "pipeline.unit",
                    json!({
                        "run_id": ctx.run_id(),
                        "unit": result.unit,
                        "success": result.success,
                        "inactive": result.inactive,
                        "duration_ms": result.duration_ms,
                        "error": result.error,
                    }),
                )
                .with_level(level),
            )
            .await;
    }

    pub async fn finalize_failed(&self, ctx: &RunContext, unit: &str, error: &anyhow::Error) {
        tracing::warn!(unit = %unit, error = %format!("{error:#}"), "unit.finalize_failed");
        self.observer.record_event(&ObserverEvent::Error {
            component: unit.to_string(),
            message: format!("finalize: {error:#}"),
        });
        self.audit
            .audit(
                AuditEntry::new(
                    self.category,
                    "pipeline.finalize_failed",
                    json!({
                        "run_id": ctx.run_id(),
                        "unit": unit,
                        "error": format!("{error:#}"),
                    }),
                )
                .with_level(AuditLevel::Warn),
            )
            .await;
    }

    /// `results` are the results produced by this run only.
    pub async fn run_finished(
        &self,
        ctx: &RunContext,
        results: &[UnitResult],
        elapsed: Duration,
        status: RunStatus,
    ) {
        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;
        tracing::info!(
            run_id = %ctx.run_id(),
            status = %status,
            succeeded,
            failed,
            duration_ms = duration_ms(elapsed),
            "pipeline.complete"
        );
        self.observer.record_event(&ObserverEvent::RunEnd {
            run_id: ctx.run_id().to_string(),
            mode: ctx.mode().to_string(),
            duration: elapsed,
            succeeded,
            failed,
        });
        self.observer
            .record_metric(&ObserverMetric::RunLatency(elapsed));

        let level = match status {
            RunStatus::Completed => AuditLevel::Info,
            RunStatus::Failed | RunStatus::TimedOut => AuditLevel::Error,
        };
        self.audit
            .audit(
                AuditEntry::new(
                    self.category,
                    "pipeline.complete",
                    json!({
                        "run_id": ctx.run_id(),
                        "status": status.to_string(),
                        "succeeded": succeeded,
                        "failed": failed,
                        "total_ms": duration_ms(elapsed),
                    }),
                )
                .with_level(level),
            )
            .await;
    }
}
