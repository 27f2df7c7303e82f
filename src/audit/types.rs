use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditCategory {
    Pipeline,
    Graph,
    Capability,
    Validation,
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

/// One append-only audit record. Duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub category: AuditCategory,
    pub level: AuditLevel,
    /// Dotted event name, e.g. `pipeline.start`.
    pub event: String,
    pub actor: String,
    #[serde(default)]
    pub details: Value,
}

impl AuditEntry {
    pub fn new(category: AuditCategory, event: impl Into<String>, details: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            category,
            level: AuditLevel::Info,
            event: event.into(),
            actor: "pipeline".into(),
            details,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: AuditLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }
}

/// Free-form durable memory item written through `capture_event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedEvent {
    pub content: String,
    #[serde(default)]
    pub metadata: Value,
    pub recorded_at: DateTime<Utc>,
}
