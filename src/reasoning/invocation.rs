use super::classify::ErrorCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Durable record of one capability attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub id: String,
    pub capability: String,
    pub args: Value,
    pub outputs: Value,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_ms: u64,
    /// Conversation (session) that triggered the call.
    pub conversation_id: String,
    pub run_id: String,
    pub iteration: u32,
    /// 1-based; retries increment it.
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
    pub recorded_at: DateTime<Utc>,
}

impl ToolInvocationRecord {
    pub fn is_retry(&self) -> bool {
        self.attempt > 1
    }
}
