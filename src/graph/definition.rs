use crate::context::RunContext;
use crate::error::{ConfigError, GraphError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Run-context value that fills an input slot no edge produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextField {
    InitialInput,
    UserMessage,
    Metadata(String),
    Flag(String),
    Mode,
    SessionId,
    UserId,
    /// Output of the most recent active unit or node.
    LastOutput,
}

impl ContextField {
    pub fn resolve(&self, ctx: &RunContext) -> Value {
        match self {
            Self::InitialInput => ctx.initial_input().clone(),
            Self::UserMessage => ctx
                .user_message()
                .map_or(Value::Null, |m| Value::String(m.to_string())),
            Self::Metadata(key) => ctx.metadata.get(key).cloned().unwrap_or(Value::Null),
            Self::Flag(name) => ctx.flag(name).as_option().map_or(Value::Null, Value::Bool),
            Self::Mode => Value::String(ctx.mode().to_string()),
            Self::SessionId => Value::String(ctx.session_id().to_string()),
            Self::UserId => Value::String(ctx.user_id().to_string()),
            Self::LastOutput => ctx.last_active_output().cloned().unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub config: Value,
    /// Slot index → context field, used only where no edge feeds the slot.
    #[serde(default)]
    pub context_inputs: BTreeMap<usize, ContextField>,
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config: Value::Null,
            context_inputs: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_context_input(mut self, slot: usize, field: ContextField) -> Self {
        self.context_inputs.insert(slot, field);
        self
    }
}

/// Wires `from`'s output into input slot `slot` of `to`. When `port` is set
/// the upstream node is a router and only `paths[port]` is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub slot: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<usize>,
}

impl EdgeDefinition {
    pub fn new(from: impl Into<String>, to: impl Into<String>, slot: usize) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            slot,
            port: None,
        }
    }

    #[must_use]
    pub fn via_port(mut self, port: usize) -> Self {
        self.port = Some(port);
        self
    }
}

/// Static node graph for one cognitive mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
    /// Node whose output is the run output. Defaults to the last active node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl GraphDefinition {
    pub fn new(nodes: Vec<NodeDefinition>, edges: Vec<EdgeDefinition>) -> Self {
        Self {
            name: String::new(),
            nodes,
            edges,
            output: None,
        }
    }

    #[must_use]
    pub fn with_output(mut self, node: impl Into<String>) -> Self {
        self.output = Some(node.into());
        self
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read a JSON graph definition from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| read_error(path, &e))?;
        Self::parse_file(&contents, path)
    }

    /// Non-blocking [`load`](Self::load) for the run path.
    pub async fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| read_error(path, &e))?;
        Self::parse_file(&contents, path)
    }

    /// Unnamed graphs take the file stem as their name.
    fn parse_file(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut definition = Self::from_json_str(contents)?;
        if definition.name.is_empty()
            && let Some(stem) = path.file_stem()
        {
            definition.name = stem.to_string_lossy().into_owned();
        }
        Ok(definition)
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == id)
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        self.execution_plan().map(|_| ())
    }

    /// Deterministic execution order as node ids.
    pub fn execution_order(&self) -> Result<Vec<String>, GraphError> {
        Ok(self
            .execution_plan()?
            .into_iter()
            .map(|index| self.nodes[index].id.clone())
            .collect())
    }

    /// Validate the wiring and return node indices in execution order.
    ///
    /// Kahn's algorithm; when several nodes are ready, the one declared first
    /// runs first.
    pub(crate) fn execution_plan(&self) -> Result<Vec<usize>, GraphError> {
        let index = self.validate_nodes()?;
        let adjacency = self.validate_edges(&index)?;
        if let Some(output) = &self.output
            && !index.contains_key(output.as_str())
        {
            return Err(GraphError::UnknownOutput(output.clone()));
        }
        validate_cycle_free(self, &adjacency)?;

        let mut in_degree = vec![0_usize; self.nodes.len()];
        for neighbors in &adjacency {
            for &to in neighbors {
                in_degree[to] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter_map(|(i, degree)| (*degree == 0).then_some(i))
            .collect();

        let mut sorted = Vec::with_capacity(self.nodes.len());
        while let Some(node) = ready.pop_first() {
            sorted.push(node);
            for &neighbor in &adjacency[node] {
                in_degree[neighbor] -= 1;
                if in_degree[neighbor] == 0 {
                    ready.insert(neighbor);
                }
            }
        }

        if sorted.len() != self.nodes.len() {
            return Err(GraphError::Cycle { path: Vec::new() });
        }
        Ok(sorted)
    }

    fn validate_nodes(&self) -> Result<HashMap<&str, usize>, GraphError> {
        let mut index = HashMap::with_capacity(self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            if node.id.trim().is_empty() {
                return Err(GraphError::EmptyNodeId);
            }
            if index.insert(node.id.as_str(), i).is_some() {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }
        Ok(index)
    }

    /// Adjacency by node index; neighbor lists keep declaration order.
    fn validate_edges(&self, index: &HashMap<&str, usize>) -> Result<Vec<Vec<usize>>, GraphError> {
        let mut adjacency = vec![Vec::new(); self.nodes.len()];
        let mut seen_edges = BTreeSet::new();
        let mut filled_slots = BTreeSet::new();

        for edge in &self.edges {
            let (Some(&from), Some(&to)) =
                (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
            else {
                return Err(GraphError::UnknownNode {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            };

            if !seen_edges.insert((from, to, edge.slot)) {
                return Err(GraphError::DuplicateEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    slot: edge.slot,
                });
            }
            if !filled_slots.insert((to, edge.slot)) {
                return Err(GraphError::SlotConflict {
                    node: edge.to.clone(),
                    slot: edge.slot,
                });
            }

            if !adjacency[from].contains(&to) {
                adjacency[from].push(to);
            }
        }

        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
        }
        Ok(adjacency)
    }
}

fn read_error(path: &Path, error: &std::io::Error) -> ConfigError {
    ConfigError::Load(format!("failed to read graph at {}: {error}", path.display()))
}

fn validate_cycle_free(
    graph: &GraphDefinition,
    adjacency: &[Vec<usize>],
) -> Result<(), GraphError> {
    let mut states = vec![None; graph.nodes.len()];
    let mut stack = Vec::new();

    for node in 0..graph.nodes.len() {
        if states[node].is_some() {
            continue;
        }
        if let Some(path) = detect_cycle(node, adjacency, &mut states, &mut stack) {
            return Err(GraphError::Cycle {
                path: path
                    .into_iter()
                    .map(|i| graph.nodes[i].id.clone())
                    .collect(),
            });
        }
    }
    Ok(())
}

fn detect_cycle(
    node: usize,
    adjacency: &[Vec<usize>],
    states: &mut [Option<NodeState>],
    stack: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    states[node] = Some(NodeState::Visiting);
    stack.push(node);

    for &neighbor in &adjacency[node] {
        match states[neighbor] {
            Some(NodeState::Visiting) => {
                if let Some(start) = stack.iter().position(|&entry| entry == neighbor) {
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(neighbor);
                    return Some(cycle);
                }
                return Some(vec![neighbor, neighbor]);
            }
            Some(NodeState::Visited) => {}
            None => {
                if let Some(path) = detect_cycle(neighbor, adjacency, states, stack) {
                    return Some(path);
                }
            }
        }
    }

    stack.pop();
    states[node] = Some(NodeState::Visited);
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Visiting,
    Visited,
}
