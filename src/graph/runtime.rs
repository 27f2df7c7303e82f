use super::definition::GraphDefinition;
use super::node::{NodeExecutor, NodeInputs, NodeRegistry};
use super::router::RouterOutput;
use crate::audit::{AuditCategory, SharedAudit};
use crate::config::FailureMode;
use crate::context::{RunContext, UnitResult};
use crate::error::{GraphError, PipelineError, Result};
use crate::observability::{NoopObserver, Observer};
use crate::pipeline::{RunReporter, RunStatus};
use crate::unit::is_inactive;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Executes a validated node graph against one run context.
///
/// Nodes run one at a time in the definition's deterministic topological
/// order, and every node is invoked. Branches are pruned at runtime: slots
/// fed by a pruned router port arrive as `null` flagged pruned, and a node
/// whose every incoming edge is dead answers with an inactive output.
pub struct GraphRuntime {
    definition: GraphDefinition,
    order: Vec<usize>,
    executors: Vec<Arc<dyn NodeExecutor>>,
    failure_mode: FailureMode,
    reporter: RunReporter,
}

impl GraphRuntime {
    pub fn new(
        definition: GraphDefinition,
        registry: &NodeRegistry,
    ) -> std::result::Result<Self, GraphError> {
        let order = definition.execution_plan()?;
        let executors = definition
            .nodes
            .iter()
            .map(|node| {
                registry
                    .get(&node.node_type)
                    .cloned()
                    .ok_or_else(|| GraphError::UnknownNodeType {
                        node: node.id.clone(),
                        node_type: node.node_type.clone(),
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            definition,
            order,
            executors,
            failure_mode: FailureMode::FailFast,
            reporter: RunReporter::new(
                SharedAudit::in_memory(),
                Arc::new(NoopObserver),
                AuditCategory::Graph,
            ),
        })
    }

    #[must_use]
    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_mode = failure_mode;
        self
    }

    #[must_use]
    pub fn with_audit(mut self, audit: SharedAudit) -> Self {
        let observer = Arc::clone(self.reporter.observer());
        self.reporter = RunReporter::new(audit, observer, AuditCategory::Graph);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        let audit = self.reporter.audit().clone();
        self.reporter = RunReporter::new(audit, observer, AuditCategory::Graph);
        self
    }

    pub fn definition(&self) -> &GraphDefinition {
        &self.definition
    }

    pub fn execution_order(&self) -> Vec<String> {
        self.order
            .iter()
            .map(|&i| self.definition.nodes[i].id.clone())
            .collect()
    }

    pub async fn execute(&self, ctx: &mut RunContext) -> Result<Value> {
        let started = Instant::now();
        let baseline = ctx.results().len();
        self.reporter.run_started(ctx, &self.execution_order()).await;

        let result = self.execute_nodes(ctx).await;

        let status = if result.is_ok() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        self.reporter
            .run_finished(ctx, &ctx.results()[baseline..], started.elapsed(), status)
            .await;
        result
    }

    /// Race [`execute`](Self::execute) against `limit`; the node in flight
    /// at expiry is abandoned without a result.
    pub async fn execute_with_timeout(
        &self,
        ctx: &mut RunContext,
        limit: Duration,
    ) -> Result<Value> {
        let started = Instant::now();
        let baseline = ctx.results().len();
        if let Ok(result) = tokio::time::timeout(limit, self.execute(ctx)).await {
            return result;
        }

        let produced = &ctx.results()[baseline..];
        let in_flight = self
            .order
            .get(produced.len())
            .map(|&i| self.definition.nodes[i].id.clone());
        tracing::warn!(
            run_id = %ctx.run_id(),
            graph = %self.definition.name,
            in_flight = in_flight.as_deref().unwrap_or("none"),
            "graph.timeout"
        );
        self.reporter
            .run_finished(ctx, produced, started.elapsed(), RunStatus::TimedOut)
            .await;
        Err(PipelineError::Timeout {
            limit_ms: crate::context::duration_ms(limit),
            in_flight,
        })
    }

    async fn execute_nodes(&self, ctx: &mut RunContext) -> Result<Value> {
        let mut outputs: Vec<Option<Value>> = vec![None; self.definition.nodes.len()];

        for &index in &self.order {
            let node = &self.definition.nodes[index];
            let executor = &self.executors[index];
            let inputs = self.resolve_inputs(index, ctx, &outputs);
            if inputs.branch_inactive() {
                tracing::debug!(node = %node.id, "graph.branch_inactive");
            }

            let started = Instant::now();
            match executor.execute(&inputs, ctx, &node.config).await {
                Ok(output) => {
                    let result =
                        UnitResult::success(node.id.clone(), output.clone(), started.elapsed());
                    self.reporter.unit_finished(ctx, &result).await;
                    ctx.record(result);

                    if let Err(error) = executor.finalize(&inputs, &output, ctx).await {
                        self.reporter.finalize_failed(ctx, &node.id, &error).await;
                    }
                    outputs[index] = Some(output);
                }
                Err(error) => {
                    let failure = node_failure(&node.id, error);
                    tracing::warn!(
                        node = %node.id,
                        error = %failure,
                        failure_mode = %self.failure_mode,
                        "graph.node_failed"
                    );
                    let result = UnitResult::failure(
                        node.id.clone(),
                        failure.to_string(),
                        started.elapsed(),
                    );
                    self.reporter.unit_finished(ctx, &result).await;
                    ctx.record(result);
                    match self.failure_mode {
                        FailureMode::FailFast => return Err(failure),
                        FailureMode::Continue => outputs[index] = Some(Value::Null),
                    }
                }
            }
        }

        Ok(self.final_output(&outputs))
    }

    fn resolve_inputs(
        &self,
        index: usize,
        ctx: &RunContext,
        outputs: &[Option<Value>],
    ) -> NodeInputs {
        let node = &self.definition.nodes[index];
        let incoming: Vec<_> = self
            .definition
            .edges
            .iter()
            .filter(|edge| edge.to == node.id)
            .collect();

        let slot_count = incoming
            .iter()
            .map(|edge| edge.slot + 1)
            .chain(node.context_inputs.keys().map(|slot| slot + 1))
            .max()
            .unwrap_or(0);
        let mut inputs = NodeInputs::with_slots(slot_count);

        for (slot, field) in &node.context_inputs {
            inputs.fill(*slot, field.resolve(ctx));
        }

        for edge in &incoming {
            let upstream = self
                .definition
                .node_index(&edge.from)
                .and_then(|i| outputs[i].as_ref())
                .cloned()
                .unwrap_or(Value::Null);

            let delivered = match edge.port {
                Some(port) => match RouterOutput::from_value(&upstream) {
                    Some(router) => router.path(port).cloned(),
                    None => Some(upstream),
                },
                None => Some(upstream),
            };
            inputs.deliver(edge.slot, delivered);
        }

        inputs
    }

    fn final_output(&self, outputs: &[Option<Value>]) -> Value {
        let designated = self
            .definition
            .output
            .as_deref()
            .and_then(|id| self.definition.node_index(id))
            .and_then(|i| outputs[i].clone())
            .filter(|value| !is_inactive(value));

        designated.unwrap_or_else(|| {
            self.order
                .iter()
                .rev()
                .filter_map(|&i| outputs[i].as_ref())
                .find(|value| !is_inactive(value) && !RouterOutput::is_router(value))
                .cloned()
                .unwrap_or(Value::Null)
        })
    }
}

/// A rejected pre-check keeps its kind; anything else is an execution
/// failure attributed to the node.
fn node_failure(node: &str, error: anyhow::Error) -> PipelineError {
    match error.downcast::<PipelineError>() {
        Ok(PipelineError::Validation { errors, .. }) => PipelineError::Validation {
            unit: node.to_string(),
            errors,
        },
        Ok(other) => PipelineError::Execution {
            unit: node.to_string(),
            message: other.to_string(),
        },
        Err(error) => PipelineError::Execution {
            unit: node.to_string(),
            message: format!("{error:#}"),
        },
    }
}
