use super::traits::{Observer, ObserverEvent, ObserverMetric};
use crate::context::duration_ms;
use tracing::{info, warn};

/// Observer backed by `tracing` events.
#[derive(Debug, Default)]
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::RunStart {
                run_id,
                mode,
                units,
            } => {
                info!(run_id = %run_id, mode = %mode, units = units, "pipeline.start");
            }
            ObserverEvent::UnitEnd {
                unit,
                duration,
                success,
                inactive,
            } => {
                info!(
                    unit = %unit,
                    duration_ms = duration_ms(*duration),
                    success = success,
                    inactive = inactive,
                    "unit.end"
                );
            }
            ObserverEvent::RunEnd {
                run_id,
                mode,
                duration,
                succeeded,
                failed,
            } => {
                info!(
                    run_id = %run_id,
                    mode = %mode,
                    duration_ms = duration_ms(*duration),
                    succeeded = succeeded,
                    failed = failed,
                    "pipeline.end"
                );
            }
            ObserverEvent::CapabilityCall {
                capability,
                duration,
                success,
                attempt,
            } => {
                info!(
                    capability = %capability,
                    duration_ms = duration_ms(*duration),
                    success = success,
                    attempt = attempt,
                    "capability.call"
                );
            }
            ObserverEvent::GateDecision { passed, refined } => {
                info!(passed = passed, refined = refined, "safety.gate");
            }
            ObserverEvent::Error { component, message } => {
                warn!(component = %component, error = %message, "error");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::RunLatency(d) => {
                info!(latency_ms = duration_ms(*d), "metric.run_latency");
            }
            ObserverMetric::UnitLatency { unit, duration } => {
                info!(unit = %unit, latency_ms = duration_ms(*duration), "metric.unit_latency");
            }
            ObserverMetric::RetryAttempt {
                capability,
                attempt,
                backoff,
            } => {
                info!(
                    capability = %capability,
                    attempt = attempt,
                    backoff_ms = duration_ms(*backoff),
                    "metric.retry_attempt"
                );
            }
            ObserverMetric::ReasoningIterations(n) => {
                info!(iterations = n, "metric.reasoning_iterations");
            }
            ObserverMetric::ValidationFailure { check, score } => {
                info!(check = %check, score = score, "metric.validation_failure");
            }
            ObserverMetric::RefinementOutcome { changed } => {
                info!(changed = changed, "metric.refinement_outcome");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
