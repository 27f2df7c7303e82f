pub mod jsonl;
pub mod sink;
pub mod types;

pub use jsonl::JsonlAuditSink;
pub use sink::{AuditSink, MemoryAuditSink};
pub use types::{AuditCategory, AuditEntry, AuditLevel, CapturedEvent};

use crate::config::ObservabilityConfig;
use serde_json::Value;
use std::sync::Arc;

/// Entries kept by the fallback in-memory sink.
pub const DEFAULT_RETAINED: usize = 1024;

/// Audit handle used by the runtime. Sink failures are logged and swallowed
/// so audit problems never abort a run.
#[derive(Clone)]
pub struct SharedAudit {
    sink: Arc<dyn AuditSink>,
}

impl SharedAudit {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Bounded in-memory sink used when nothing durable is configured.
    /// Keeps the newest [`DEFAULT_RETAINED`] entries.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryAuditSink::bounded(DEFAULT_RETAINED)))
    }

    pub fn sink(&self) -> &Arc<dyn AuditSink> {
        &self.sink
    }

    pub async fn audit(&self, entry: AuditEntry) {
        let event = entry.event.clone();
        if let Err(error) = self.sink.audit(entry).await {
            tracing::warn!(
                sink = self.sink.name(),
                event = %event,
                error = %format!("{error:#}"),
                "audit.write_failed"
            );
        }
    }

    pub async fn capture_event(&self, content: &str, metadata: Value) {
        if let Err(error) = self.sink.capture_event(content, metadata).await {
            tracing::warn!(
                sink = self.sink.name(),
                error = %format!("{error:#}"),
                "audit.capture_failed"
            );
        }
    }
}

impl std::fmt::Debug for SharedAudit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedAudit")
            .field("sink", &self.sink.name())
            .finish()
    }
}

/// JSONL sink when `audit_dir` is configured, bounded in-memory otherwise.
pub fn create_audit(config: &ObservabilityConfig) -> SharedAudit {
    match config.resolved_audit_dir() {
        Some(dir) => SharedAudit::new(Arc::new(JsonlAuditSink::new(dir))),
        None => SharedAudit::in_memory(),
    }
}
