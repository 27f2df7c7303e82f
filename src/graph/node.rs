use super::router::{FlagRouterNode, RouterOutput};
use crate::context::RunContext;
use crate::error::PipelineError;
use crate::unit::{ExecutionUnit, inactive_output, is_inactive};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolved input slots for one node invocation.
///
/// Each slot holds an upstream output or a context field. A slot fed by a
/// pruned router port holds `null` and reports [`is_pruned`](Self::is_pruned);
/// a slot fed by an inactive producer holds `{}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeInputs {
    values: Vec<Value>,
    pruned: Vec<bool>,
    edge_fed: Vec<bool>,
}

impl NodeInputs {
    /// Slots with no graph edge behind them.
    pub fn new(values: Vec<Value>) -> Self {
        let len = values.len();
        Self {
            values,
            pruned: vec![false; len],
            edge_fed: vec![false; len],
        }
    }

    pub(crate) fn with_slots(count: usize) -> Self {
        Self::new(vec![Value::Null; count])
    }

    pub(crate) fn fill(&mut self, slot: usize, value: Value) {
        self.values[slot] = value;
    }

    /// Deliver an edge's payload. `None` is a pruned router port.
    pub(crate) fn deliver(&mut self, slot: usize, payload: Option<Value>) {
        self.edge_fed[slot] = true;
        self.pruned[slot] = payload.is_none();
        self.values[slot] = payload.unwrap_or(Value::Null);
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, slot: usize) -> Option<&Value> {
        self.values.get(slot)
    }

    pub fn is_pruned(&self, slot: usize) -> bool {
        self.pruned.get(slot).copied().unwrap_or(false)
    }

    /// Every edge into the node carried a pruned port or an inactive output.
    /// Nodes without incoming edges are never inactive by wiring.
    pub fn branch_inactive(&self) -> bool {
        let mut fed = (0..self.values.len())
            .filter(|&slot| self.edge_fed[slot])
            .peekable();
        fed.peek().is_some()
            && fed.all(|slot| self.pruned[slot] || is_inactive(&self.values[slot]))
    }

    /// First slot carrying a live payload.
    pub fn first_live(&self) -> Option<&Value> {
        self.values
            .iter()
            .enumerate()
            .find(|(slot, value)| {
                !self.pruned[*slot]
                    && !value.is_null()
                    && !is_inactive(value)
                    && !RouterOutput::is_router(value)
            })
            .map(|(_, value)| value)
    }
}

/// A graph node implementation.
///
/// Every node in the execution order is invoked. A node on a branch that is
/// off for this run ([`NodeInputs::branch_inactive`]) returns
/// [`inactive_output`] instead of failing.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    fn node_type(&self) -> &str;

    async fn execute(
        &self,
        inputs: &NodeInputs,
        ctx: &mut RunContext,
        config: &Value,
    ) -> anyhow::Result<Value>;

    /// Runs after the node's result is recorded. Failures are audited by the
    /// runtime and never fail the run.
    async fn finalize(
        &self,
        _inputs: &NodeInputs,
        _output: &Value,
        _ctx: &RunContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Node type → executor.
#[derive(Default)]
pub struct NodeRegistry {
    executors: HashMap<String, Arc<dyn NodeExecutor>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the router and select nodes.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FlagRouterNode));
        registry.register(Arc::new(SelectNode));
        registry
    }

    pub fn register(&mut self, executor: Arc<dyn NodeExecutor>) {
        self.executors
            .insert(executor.node_type().to_string(), executor);
    }

    /// Expose an execution unit as a node type named after the unit.
    pub fn register_unit(&mut self, unit: Arc<dyn ExecutionUnit>) {
        self.register(Arc::new(UnitNode::new(unit)));
    }

    pub fn get(&self, node_type: &str) -> Option<&Arc<dyn NodeExecutor>> {
        self.executors.get(node_type)
    }

    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// Runs an [`ExecutionUnit`] as a graph node on its first live input.
///
/// A rejected pre-check surfaces as [`PipelineError::Validation`]; the unit's
/// `finalize` runs from [`NodeExecutor::finalize`], after the runtime has
/// recorded the result.
pub struct UnitNode {
    unit: Arc<dyn ExecutionUnit>,
}

impl UnitNode {
    pub fn new(unit: Arc<dyn ExecutionUnit>) -> Self {
        Self { unit }
    }
}

#[async_trait]
impl NodeExecutor for UnitNode {
    fn node_type(&self) -> &str {
        self.unit.name()
    }

    async fn execute(
        &self,
        inputs: &NodeInputs,
        ctx: &mut RunContext,
        config: &Value,
    ) -> anyhow::Result<Value> {
        if inputs.branch_inactive() {
            return Ok(inactive_output());
        }
        let input = inputs.first_live().cloned().unwrap_or(Value::Null);

        let errors = match self.unit.validate(&input, ctx).await {
            Ok(report) if report.valid => {
                for warning in &report.warnings {
                    tracing::warn!(
                        unit = %self.unit.name(),
                        warning = %warning,
                        "unit.validation_warning"
                    );
                }
                None
            }
            Ok(report) => Some(report.errors),
            Err(error) => Some(vec![format!("{error:#}")]),
        };
        if let Some(errors) = errors {
            return Err(PipelineError::Validation {
                unit: self.unit.name().to_string(),
                errors,
            }
            .into());
        }

        self.unit.process(input, ctx, config).await
    }

    async fn finalize(
        &self,
        inputs: &NodeInputs,
        output: &Value,
        ctx: &RunContext,
    ) -> anyhow::Result<()> {
        if inputs.branch_inactive() {
            return Ok(());
        }
        self.unit.finalize(output, ctx).await
    }
}

/// Merge point for mutually exclusive branches: forwards the first live
/// input, or reports inactive when every branch was pruned.
#[derive(Debug, Default)]
pub struct SelectNode;

#[async_trait]
impl NodeExecutor for SelectNode {
    fn node_type(&self) -> &str {
        "select"
    }

    async fn execute(
        &self,
        inputs: &NodeInputs,
        _ctx: &mut RunContext,
        _config: &Value,
    ) -> anyhow::Result<Value> {
        Ok(inputs
            .first_live()
            .cloned()
            .unwrap_or_else(inactive_output))
    }
}
