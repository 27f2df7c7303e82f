use serde_json::{Map, Value};

/// Output a unit or node returns when its branch does not apply to this run.
pub fn inactive_output() -> Value {
    Value::Object(Map::new())
}

/// Whether `value` is the "not applicable" marker.
pub fn is_inactive(value: &Value) -> bool {
    value.as_object().is_some_and(Map::is_empty)
}

/// Pulls response text out of a unit payload.
///
/// Accepts a bare string or an object carrying `response`, `answer`, `text`
/// or `content`.
pub fn extract_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(text) => Some(text.as_str()),
        Value::Object(map) => ["response", "answer", "text", "content"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str)),
        _ => None,
    }
}

/// Writes `text` back into a payload shaped like the one it came from.
pub fn replace_text(value: &Value, text: &str) -> Value {
    match value {
        Value::Object(map) => {
            let mut map = map.clone();
            let key = ["response", "answer", "text", "content"]
                .into_iter()
                .find(|key| map.get(*key).is_some_and(Value::is_string))
                .unwrap_or("response");
            map.insert(key.to_string(), Value::String(text.to_string()));
            Value::Object(map)
        }
        _ => Value::String(text.to_string()),
    }
}
