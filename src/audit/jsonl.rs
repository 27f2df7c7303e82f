use super::sink::AuditSink;
use super::types::AuditEntry;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends one JSON object per line to `<dir>/<YYYY-MM-DD>.jsonl`.
pub struct JsonlAuditSink {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_path(&self) -> PathBuf {
        let date = Utc::now().format("%Y-%m-%d").to_string();
        self.dir.join(format!("{date}.jsonl"))
    }

    async fn append(&self, record: &Value) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.current_path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let mut line = record.to_string();
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn capture_event(&self, content: &str, metadata: Value) -> anyhow::Result<()> {
        self.append(&json!({
            "kind": "event",
            "recorded_at": Utc::now().to_rfc3339(),
            "content": content,
            "metadata": metadata,
        }))
        .await
    }

    async fn audit(&self, entry: AuditEntry) -> anyhow::Result<()> {
        let mut record = serde_json::to_value(&entry)?;
        if let Value::Object(map) = &mut record {
            map.insert("kind".into(), Value::String("audit".into()));
        }
        self.append(&record).await
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}
