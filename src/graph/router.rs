use super::node::{NodeExecutor, NodeInputs};
use crate::context::{RunContext, USE_TOOLS_FLAG};
use crate::unit::{extract_text, inactive_output};
use async_trait::async_trait;
use serde_json::{Value, json};

const ROUTER_KIND: &str = "router";

/// Tagged multi-path output. A `None` path is the pruning signal: consumers
/// wired to that port must not act on it.
///
/// On the wire a live path is wrapped as `{"value": payload}` and a pruned
/// one is `null`, so a live `null` payload stays distinguishable.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterOutput {
    pub paths: Vec<Option<Value>>,
}

impl RouterOutput {
    pub fn new(paths: Vec<Option<Value>>) -> Self {
        Self { paths }
    }

    pub fn to_value(&self) -> Value {
        let paths: Vec<Value> = self
            .paths
            .iter()
            .map(|path| match path {
                Some(payload) => json!({ "value": payload }),
                None => Value::Null,
            })
            .collect();
        json!({ "kind": ROUTER_KIND, "paths": paths })
    }

    /// Parse a router payload. Non-router values yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        if map.get("kind").and_then(Value::as_str) != Some(ROUTER_KIND) {
            return None;
        }
        let paths = map
            .get("paths")?
            .as_array()?
            .iter()
            .map(|path| path.get("value").cloned())
            .collect();
        Some(Self { paths })
    }

    pub fn is_router(value: &Value) -> bool {
        value
            .as_object()
            .and_then(|map| map.get("kind"))
            .and_then(Value::as_str)
            == Some(ROUTER_KIND)
    }

    /// Live payload on `port`, or `None` when the path is pruned or absent.
    pub fn path(&self, port: usize) -> Option<&Value> {
        self.paths.get(port).and_then(Option::as_ref)
    }
}

/// Two-way router on a routing flag.
///
/// Port 0 carries the payload when the flag resolves true, port 1 when it
/// resolves false; the other port is pruned. An unset flag is inferred from
/// the input and written back to the context so downstream nodes agree.
///
/// Config: `{ "flag": "use_tools", "keywords": [...], "default": false }`.
#[derive(Debug, Default)]
pub struct FlagRouterNode;

impl FlagRouterNode {
    fn infer(payload: &Value, config: &Value, flag: &str) -> bool {
        if let Some(explicit) = payload.get(flag).and_then(Value::as_bool) {
            return explicit;
        }
        let keywords = config
            .get("keywords")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect::<Vec<_>>())
            .unwrap_or_default();
        if let Some(text) = extract_text(payload).or_else(|| payload.get("message")?.as_str()) {
            let lowered = text.to_lowercase();
            if keywords
                .iter()
                .any(|keyword| lowered.contains(&keyword.to_lowercase()))
            {
                return true;
            }
        }
        config
            .get("default")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[async_trait]
impl NodeExecutor for FlagRouterNode {
    fn node_type(&self) -> &str {
        "router"
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
        let flag = config
            .get("flag")
            .and_then(Value::as_str)
            .unwrap_or(USE_TOOLS_FLAG)
            .to_string();
        let payload = inputs.get(0).cloned().unwrap_or(Value::Null);

        let current = ctx.flag(&flag);
        let enabled = current.resolve(|| Self::infer(&payload, config, &flag));
        if !current.is_set() {
            ctx.set_flag(flag.clone(), enabled);
        }
        tracing::debug!(flag = %flag, enabled, inferred = !current.is_set(), "graph.route");

        let paths = if enabled {
            vec![Some(payload), None]
        } else {
            vec![None, Some(payload)]
        };
        Ok(RouterOutput::new(paths).to_value())
    }
}
