use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the execution pipeline.
///
/// Validation and execution failures abort a run only under fail-fast;
/// configuration failures always block pipeline construction. Collaborator
/// seams (units, capabilities, generation, audit) keep using `anyhow::Result`
/// and are folded into these variants at the runner boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Unit pre-check ──────────────────────────────────────────────────
    #[error("unit {unit} rejected input: {}", errors.join("; "))]
    Validation { unit: String, errors: Vec<String> },

    // ── Unit process step ───────────────────────────────────────────────
    #[error("unit {unit} failed: {message}")]
    Execution { unit: String, message: String },

    // ── Config ──────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Configuration(#[from] ConfigError),

    // ── Run ceiling ─────────────────────────────────────────────────────
    #[error(
        "run exceeded {limit_ms}ms ceiling (in flight: {})",
        in_flight.as_deref().unwrap_or("none")
    )]
    Timeout {
        limit_ms: u64,
        in_flight: Option<String>,
    },

    // ── Graph wiring ────────────────────────────────────────────────────
    #[error("graph: {0}")]
    Graph(#[from] GraphError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("mode {0} is missing from config")]
    MissingMode(String),

    #[error("duplicate unit {unit} in mode {mode}")]
    DuplicateUnit { mode: String, unit: String },

    #[error("unknown unit {unit} in mode {mode}")]
    UnknownUnit { mode: String, unit: String },

    #[error("validation failed: {0}")]
    Invalid(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Graph errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node id cannot be empty")]
    EmptyNodeId,

    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("edge references unknown node: {from} -> {to}")]
    UnknownNode { from: String, to: String },

    #[error("duplicate edge: {from} -> {to} (slot {slot})")]
    DuplicateEdge {
        from: String,
        to: String,
        slot: usize,
    },

    #[error("input slot {slot} of node {node} has more than one producer")]
    SlotConflict { node: String, slot: usize },

    #[error("cycle detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("node {node} has unknown type {node_type}")]
    UnknownNodeType { node: String, node_type: String },

    #[error("output node {0} is not declared")]
    UnknownOutput(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
