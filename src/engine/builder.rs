use super::CognitiveEngine;
use crate::audit::{SharedAudit, create_audit};
use crate::config::ConfigHandle;
use crate::generation::GenerationService;
use crate::graph::{GraphDefinition, NodeExecutor, NodeRegistry};
use crate::observability::{MultiObserver, Observer, create_observer};
use crate::reasoning::{CapabilityExecutor, ReasoningLoop, ReasoningNode, ReasoningUnit};
use crate::safety::{SafetyGate, SafetyGateUnit};
use crate::unit::{ExecutionUnit, UnitRegistry};
use std::collections::HashMap;
use std::sync::Arc;

/// Assembles a [`CognitiveEngine`] from its collaborators.
///
/// The reasoning and safety-gate units are always registered, both as
/// linear units and as graph node types. Host units added with
/// [`with_unit`](Self::with_unit) become node types too.
pub struct EngineBuilder {
    config: ConfigHandle,
    generation: Arc<dyn GenerationService>,
    capabilities: Arc<dyn CapabilityExecutor>,
    units: Vec<Arc<dyn ExecutionUnit>>,
    nodes: Vec<Arc<dyn NodeExecutor>>,
    graphs: Vec<GraphDefinition>,
    audit: Option<SharedAudit>,
    observers: Vec<Arc<dyn Observer>>,
}

impl EngineBuilder {
    pub(super) fn new(
        config: ConfigHandle,
        generation: Arc<dyn GenerationService>,
        capabilities: Arc<dyn CapabilityExecutor>,
    ) -> Self {
        Self {
            config,
            generation,
            capabilities,
            units: Vec::new(),
            nodes: Vec::new(),
            graphs: Vec::new(),
            audit: None,
            observers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: Arc<dyn ExecutionUnit>) -> Self {
        self.units.push(unit);
        self
    }

    #[must_use]
    pub fn with_node(mut self, node: Arc<dyn NodeExecutor>) -> Self {
        self.nodes.push(node);
        self
    }

    /// Register a graph under its `name`, referenced by a mode's `graph` key.
    #[must_use]
    pub fn with_graph(mut self, graph: GraphDefinition) -> Self {
        self.graphs.push(graph);
        self
    }

    #[must_use]
    pub fn with_audit(mut self, audit: SharedAudit) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Add an observer. Several observers receive every event in the order
    /// they were added; with none, the config's backend is used.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> CognitiveEngine {
        let snapshot = self.config.load_full();
        let audit = self
            .audit
            .unwrap_or_else(|| create_audit(&snapshot.observability));
        let observer: Arc<dyn Observer> = match self.observers.len() {
            0 => create_observer(&snapshot.observability),
            1 => Arc::clone(&self.observers[0]),
            _ => Arc::new(MultiObserver::new(self.observers)),
        };

        let reasoning = Arc::new(
            ReasoningLoop::new(
                Arc::clone(&self.generation),
                self.capabilities,
                snapshot.reasoning.clone(),
            )
            .with_audit(audit.clone())
            .with_observer(Arc::clone(&observer)),
        );
        let gate = Arc::new(
            SafetyGate::new(self.generation)
                .with_audit(audit.clone())
                .with_observer(Arc::clone(&observer)),
        );
        let safety_unit: Arc<dyn ExecutionUnit> =
            Arc::new(SafetyGateUnit::new(gate, self.config.clone()));

        let mut units = UnitRegistry::new();
        let mut nodes = NodeRegistry::with_builtins();
        units.register(Arc::new(ReasoningUnit::new(Arc::clone(&reasoning))));
        nodes.register(Arc::new(ReasoningNode::new(reasoning)));
        units.register(Arc::clone(&safety_unit));
        nodes.register_unit(safety_unit);

        for unit in self.units {
            nodes.register_unit(Arc::clone(&unit));
            units.register(unit);
        }
        for node in self.nodes {
            nodes.register(node);
        }

        let graphs: HashMap<String, GraphDefinition> = self
            .graphs
            .into_iter()
            .map(|graph| (graph.name.clone(), graph))
            .collect();

        tracing::info!(
            units = ?units.names(),
            node_types = ?nodes.node_types(),
            graphs = graphs.len(),
            "engine.ready"
        );

        CognitiveEngine {
            config: self.config,
            units,
            nodes,
            graphs,
            audit,
            observer,
        }
    }
}
