use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Gating policy for capability invocations, ordered from most to least
/// restrictive.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrustLevel {
    /// Observe only; nothing executes.
    Observe,
    /// May propose actions.
    Suggest,
    /// Executes low-risk capabilities; anything flagged needs approval.
    #[default]
    Supervised,
    /// Executes approval-flagged capabilities within policy bounds.
    Bounded,
    /// Full autonomy.
    Autonomous,
}

impl TrustLevel {
    pub fn can_auto_approve(self) -> bool {
        self >= Self::Bounded
    }
}

/// Static description of a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub id: String,
    pub description: String,
    pub min_trust: TrustLevel,
    pub requires_approval: bool,
}

impl CapabilityDescriptor {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            min_trust: TrustLevel::Suggest,
            requires_approval: false,
        }
    }

    pub fn with_min_trust(mut self, min_trust: TrustLevel) -> Self {
        self.min_trust = min_trust;
        self
    }

    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }
}

/// Result of one capability invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityOutcome {
    pub success: bool,
    pub outputs: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CapabilityOutcome {
    pub fn ok(outputs: Value) -> Self {
        Self {
            success: true,
            outputs,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            outputs: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// A named operation the reasoning loop can invoke.
#[async_trait]
pub trait Capability: Send + Sync {
    fn descriptor(&self) -> &CapabilityDescriptor;

    async fn execute(&self, args: Value) -> anyhow::Result<Value>;
}

/// Collaborator that resolves and runs capabilities by id.
#[async_trait]
pub trait CapabilityExecutor: Send + Sync {
    async fn execute(&self, id: &str, args: Value, trust: TrustLevel) -> CapabilityOutcome;

    /// Descriptors offered to the planner.
    fn descriptors(&self) -> Vec<CapabilityDescriptor>;
}

/// In-process capability table: an arena of capabilities plus an id index.
#[derive(Default)]
pub struct CapabilityRegistry {
    arena: Vec<Arc<dyn Capability>>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. Replaces any existing one with the same id.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let id = capability.descriptor().id.clone();
        if let Some(&slot) = self.index.get(&id) {
            self.arena[slot] = capability;
        } else {
            self.index.insert(id, self.arena.len());
            self.arena.push(capability);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Capability>> {
        self.index.get(id).map(|&slot| &self.arena[slot])
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}

#[async_trait]
impl CapabilityExecutor for CapabilityRegistry {
    async fn execute(&self, id: &str, args: Value, trust: TrustLevel) -> CapabilityOutcome {
        let Some(capability) = self.get(id) else {
            return CapabilityOutcome::failed(format!("capability not found: {id}"));
        };

        let descriptor = capability.descriptor();
        if trust < descriptor.min_trust {
            return CapabilityOutcome::failed(format!(
                "permission denied: capability '{id}' requires trust level {} (current: {trust})",
                descriptor.min_trust
            ));
        }
        if descriptor.requires_approval && !trust.can_auto_approve() {
            return CapabilityOutcome::failed(format!(
                "permission denied: capability '{id}' requires approval at trust level {trust}"
            ));
        }

        match capability.execute(args).await {
            Ok(outputs) => CapabilityOutcome::ok(outputs),
            Err(error) => CapabilityOutcome::failed(format!("{error:#}")),
        }
    }

    fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.arena
            .iter()
            .map(|capability| capability.descriptor().clone())
            .collect()
    }
}
