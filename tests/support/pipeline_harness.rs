#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use cognitive_pipeline::audit::{MemoryAuditSink, SharedAudit};
use cognitive_pipeline::context::RunContext;
use cognitive_pipeline::generation::{
    GenerationRequest, GenerationResponse, GenerationRole, GenerationService,
};
use cognitive_pipeline::observability::{Observer, ObserverEvent, ObserverMetric};
use cognitive_pipeline::reasoning::{Capability, CapabilityDescriptor};
use cognitive_pipeline::unit::{ExecutionUnit, ValidationReport};
use serde_json::Value;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Generation stub: per-role response queues with optional fallbacks.
#[derive(Default)]
pub struct StubGeneration {
    queues: Mutex<HashMap<GenerationRole, VecDeque<String>>>,
    fallbacks: Mutex<HashMap<GenerationRole, String>>,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl StubGeneration {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue(&self, role: GenerationRole, content: &str) -> &Self {
        lock(&self.queues)
            .entry(role)
            .or_default()
            .push_back(content.to_string());
        self
    }

    pub fn fallback(&self, role: GenerationRole, content: &str) -> &Self {
        lock(&self.fallbacks).insert(role, content.to_string());
        self
    }

    pub fn calls(&self, role: GenerationRole) -> usize {
        lock(&self.seen).iter().filter(|r| r.role == role).count()
    }

    pub fn seen(&self) -> Vec<GenerationRequest> {
        lock(&self.seen).clone()
    }
}

#[async_trait]
impl GenerationService for StubGeneration {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let role = request.role;
        lock(&self.seen).push(request);
        let queued = lock(&self.queues).get_mut(&role).and_then(VecDeque::pop_front);
        match queued.or_else(|| lock(&self.fallbacks).get(&role).cloned()) {
            Some(content) => Ok(GenerationResponse::new(content)),
            None => anyhow::bail!("stub generation has nothing for {role}"),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Capability that fails with scripted messages, then returns `output`.
pub struct StubCapability {
    descriptor: CapabilityDescriptor,
    failures: Mutex<VecDeque<String>>,
    output: Value,
    calls: Mutex<Vec<(Value, tokio::time::Instant)>>,
}

impl StubCapability {
    pub fn new(id: &str, output: Value) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(id, format!("stub capability {id}")),
            failures: Mutex::new(VecDeque::new()),
            output,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_with(self, messages: &[&str]) -> Self {
        lock(&self.failures).extend(messages.iter().map(|m| (*m).to_string()));
        self
    }

    pub fn with_descriptor(mut self, descriptor: CapabilityDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn call_args(&self) -> Vec<Value> {
        lock(&self.calls).iter().map(|(args, _)| args.clone()).collect()
    }

    /// Gaps between consecutive calls.
    pub fn call_gaps(&self) -> Vec<Duration> {
        lock(&self.calls)
            .windows(2)
            .map(|pair| pair[1].1 - pair[0].1)
            .collect()
    }
}

#[async_trait]
impl Capability for StubCapability {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        lock(&self.calls).push((args, tokio::time::Instant::now()));
        if let Some(message) = lock(&self.failures).pop_front() {
            anyhow::bail!("{message}");
        }
        Ok(self.output.clone())
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    /// Append text to the incoming string payload.
    Append(&'static str),
    Fail(&'static str),
    Reject(&'static str),
    Sleep(Duration),
    Inactive,
    /// Output whatever the previous unit's recorded output was.
    Continuation,
}

/// Scripted unit that records which inputs it saw.
pub struct StepUnit {
    name: String,
    step: Step,
    seen: Mutex<Vec<Value>>,
}

impl StepUnit {
    pub fn new(name: &str, step: Step) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            step,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<Value> {
        lock(&self.seen).clone()
    }
}

#[async_trait]
impl ExecutionUnit for StepUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self, _input: &Value, _ctx: &RunContext) -> Result<ValidationReport> {
        Ok(match self.step {
            Step::Reject(reason) => ValidationReport::invalid(reason),
            _ => ValidationReport::valid(),
        })
    }

    async fn process(&self, input: Value, ctx: &mut RunContext, _config: &Value) -> Result<Value> {
        lock(&self.seen).push(input.clone());
        match &self.step {
            Step::Append(text) => Ok(Value::String(format!(
                "{}{text}",
                input.as_str().unwrap_or_default()
            ))),
            Step::Fail(message) => anyhow::bail!("{message}"),
            Step::Reject(_) => Ok(input),
            Step::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(input)
            }
            Step::Inactive => Ok(cognitive_pipeline::unit::inactive_output()),
            Step::Continuation => Ok(ctx
                .last_result()
                .and_then(|result| result.output.clone())
                .unwrap_or(Value::Null)),
        }
    }
}

/// Observer that keeps every event and metric.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
    metrics: Mutex<Vec<ObserverMetric>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ObserverEvent> {
        lock(&self.events).clone()
    }

    pub fn metrics(&self) -> Vec<ObserverMetric> {
        lock(&self.metrics).clone()
    }
}

impl Observer for RecordingObserver {
    fn record_event(&self, event: &ObserverEvent) {
        lock(&self.events).push(event.clone());
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        lock(&self.metrics).push(metric.clone());
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn memory_audit() -> (Arc<MemoryAuditSink>, SharedAudit) {
    let sink = Arc::new(MemoryAuditSink::new());
    let audit = SharedAudit::new(sink.clone());
    (sink, audit)
}
