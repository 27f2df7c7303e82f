use super::flags::RoutingFlag;
use super::mode::CognitiveMode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome of one executed unit or graph node.
///
/// Appended to the run context exactly once per executed unit, in execution
/// order, and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitResult {
    pub unit: String,
    pub success: bool,
    pub output: Option<Value>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The unit reported itself not applicable for this run.
    #[serde(default)]
    pub inactive: bool,
    pub recorded_at: String,
}

impl UnitResult {
    pub fn success(unit: impl Into<String>, output: Value, duration: Duration) -> Self {
        let inactive = crate::unit::is_inactive(&output);
        Self {
            unit: unit.into(),
            success: true,
            output: Some(output),
            duration_ms: duration_ms(duration),
            error: None,
            inactive,
            recorded_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn failure(unit: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            unit: unit.into(),
            success: false,
            output: None,
            duration_ms: duration_ms(duration),
            error: Some(error.into()),
            inactive: false,
            recorded_at: Utc::now().to_rfc3339(),
        }
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Host-supplied adjustments applied when a run context is created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextOverrides {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

impl ContextOverrides {
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.flags.insert(name.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Run-scoped state threaded through every unit and node invocation.
///
/// Built fresh for every run and never shared between concurrent runs. The
/// identity fields are fixed at construction; the result history only grows.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: String,
    mode: CognitiveMode,
    user_id: String,
    session_id: String,
    initial_input: Value,
    results: Vec<UnitResult>,
    /// Free-form scratch space shared between units.
    pub metadata: Map<String, Value>,
    flags: BTreeMap<String, RoutingFlag>,
}

impl RunContext {
    pub fn new(mode: CognitiveMode, initial_input: Value, overrides: ContextOverrides) -> Self {
        let flags = overrides
            .flags
            .into_iter()
            .map(|(name, value)| (name, RoutingFlag::from_bool(value)))
            .collect();

        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            mode,
            user_id: overrides.user_id.unwrap_or_else(|| "anonymous".to_string()),
            session_id: overrides
                .session_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            initial_input,
            results: Vec::new(),
            metadata: overrides.metadata,
            flags,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn mode(&self) -> CognitiveMode {
        self.mode
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn initial_input(&self) -> &Value {
        &self.initial_input
    }

    pub fn results(&self) -> &[UnitResult] {
        &self.results
    }

    pub fn last_result(&self) -> Option<&UnitResult> {
        self.results.last()
    }

    pub fn result_for(&self, unit: &str) -> Option<&UnitResult> {
        self.results.iter().rev().find(|result| result.unit == unit)
    }

    /// Output of the most recent unit that succeeded and was applicable.
    pub fn last_active_output(&self) -> Option<&Value> {
        self.results
            .iter()
            .rev()
            .filter(|result| result.success && !result.inactive)
            .find_map(|result| result.output.as_ref())
    }

    pub(crate) fn record(&mut self, result: UnitResult) {
        self.results.push(result);
    }

    pub(crate) fn into_results(self) -> Vec<UnitResult> {
        self.results
    }

    pub fn flag(&self, name: &str) -> RoutingFlag {
        self.flags.get(name).copied().unwrap_or_default()
    }

    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
        self.flags.insert(name.into(), RoutingFlag::from_bool(value));
    }

    pub fn clear_flag(&mut self, name: &str) {
        self.flags.remove(name);
    }

    pub fn flags(&self) -> &BTreeMap<String, RoutingFlag> {
        &self.flags
    }

    /// Message text of the initial input, if it carries one.
    pub fn user_message(&self) -> Option<&str> {
        match &self.initial_input {
            Value::String(text) => Some(text.as_str()),
            Value::Object(map) => map
                .get("message")
                .or_else(|| map.get("text"))
                .and_then(Value::as_str),
            _ => None,
        }
    }
}
