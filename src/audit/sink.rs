use super::types::{AuditEntry, CapturedEvent};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Durable memory and audit collaborator. Writes are append-only.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn capture_event(&self, content: &str, metadata: Value) -> anyhow::Result<()>;

    async fn audit(&self, entry: AuditEntry) -> anyhow::Result<()>;

    fn name(&self) -> &str;
}

/// In-process sink. Everything written stays inspectable.
///
/// A bounded sink keeps only the newest `capacity` entries and events;
/// [`MemoryAuditSink::new`] retains everything and is meant for tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<VecDeque<AuditEntry>>,
    events: Mutex<VecDeque<CapturedEvent>>,
    capacity: Option<usize>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        lock(&self.entries).iter().cloned().collect()
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        lock(&self.events).iter().cloned().collect()
    }

    /// Entries whose event name matches `event` exactly.
    pub fn entries_named(&self, event: &str) -> Vec<AuditEntry> {
        lock(&self.entries)
            .iter()
            .filter(|entry| entry.event == event)
            .cloned()
            .collect()
    }

    fn push<T>(&self, buffer: &Mutex<VecDeque<T>>, item: T) {
        let mut buffer = lock(buffer);
        if let Some(capacity) = self.capacity
            && buffer.len() >= capacity
        {
            buffer.pop_front();
        }
        buffer.push_back(item);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn capture_event(&self, content: &str, metadata: Value) -> anyhow::Result<()> {
        self.push(
            &self.events,
            CapturedEvent {
                content: content.to_string(),
                metadata,
                recorded_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn audit(&self, entry: AuditEntry) -> anyhow::Result<()> {
        self.push(&self.entries, entry);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
