use std::time::Duration;

/// Discrete pipeline events.
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    RunStart {
        run_id: String,
        mode: String,
        units: usize,
    },
    UnitEnd {
        unit: String,
        duration: Duration,
        success: bool,
        inactive: bool,
    },
    RunEnd {
        run_id: String,
        mode: String,
        duration: Duration,
        succeeded: usize,
        failed: usize,
    },
    CapabilityCall {
        capability: String,
        duration: Duration,
        success: bool,
        attempt: u32,
    },
    GateDecision {
        passed: bool,
        refined: bool,
    },
    Error {
        component: String,
        message: String,
    },
}

/// Numeric metrics
#[derive(Debug, Clone)]
pub enum ObserverMetric {
    RunLatency(Duration),
    UnitLatency { unit: String, duration: Duration },
    RetryAttempt {
        capability: String,
        attempt: u32,
        backoff: Duration,
    },
    ReasoningIterations(u64),
    ValidationFailure { check: String, score: f64 },
    /// `changed == false` means the refiner returned the text untouched.
    RefinementOutcome { changed: bool },
}

/// Observability seam. Implementations must be cheap and never fail.
pub trait Observer: Send + Sync {
    fn record_event(&self, event: &ObserverEvent);

    fn record_metric(&self, metric: &ObserverMetric);

    /// Flush any buffered data (no-op for most backends)
    fn flush(&self) {}

    fn name(&self) -> &str;
}
