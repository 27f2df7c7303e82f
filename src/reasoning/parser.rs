use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static FINAL_ANSWER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^[ \t]*final answer[ \t]*:").expect("static regex"));
static ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^[ \t]*action[ \t]*:[ \t]*(.*)$").expect("static regex"));
static ACTION_INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^[ \t]*action input[ \t]*:").expect("static regex"));
static THOUGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?mi)^[ \t]*thought[ \t]*:").expect("static regex"));

/// Arguments following an `Action Input:` marker.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionInput {
    Args(Value),
    /// The marker was present but no valid JSON object followed it.
    Invalid { raw: String, error: String },
}

/// One planner turn, parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPlan {
    FinalAnswer {
        thought: Option<String>,
        answer: String,
    },
    Action {
        thought: Option<String>,
        action: String,
        input: ActionInput,
    },
    Malformed {
        reason: String,
    },
}

impl ParsedPlan {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. })
    }

    pub fn thought(&self) -> Option<&str> {
        match self {
            Self::FinalAnswer { thought, .. } | Self::Action { thought, .. } => thought.as_deref(),
            Self::Malformed { .. } => None,
        }
    }
}

/// Parser for the `Thought:` / `Action:` / `Action Input:` / `Final Answer:`
/// line grammar. A final answer anywhere in the text wins over an action.
pub struct PlanParser;

impl PlanParser {
    pub fn format_prompt() -> &'static str {
        concat!(
            "Respond using exactly this format:\n",
            "Thought: <your reasoning>\n",
            "Action: <capability id>\n",
            "Action Input: <JSON object of arguments>\n\n",
            "When you know the answer, respond with:\n",
            "Thought: <your reasoning>\n",
            "Final Answer: <the answer for the user>",
        )
    }

    pub fn parse(text: &str) -> ParsedPlan {
        let thought = Self::thought(text);

        if let Some(marker) = FINAL_ANSWER.find(text) {
            let answer = text[marker.end()..].trim().to_string();
            return ParsedPlan::FinalAnswer { thought, answer };
        }

        let Some(captures) = ACTION.captures(text) else {
            return ParsedPlan::Malformed {
                reason: "no Action or Final Answer marker found".into(),
            };
        };
        let action = captures
            .get(1)
            .map(|m| clean_action_name(m.as_str()))
            .unwrap_or_default();
        if action.is_empty() {
            return ParsedPlan::Malformed {
                reason: "Action marker without a capability name".into(),
            };
        }

        let input = match ACTION_INPUT.find(text) {
            None => ActionInput::Args(Value::Object(serde_json::Map::new())),
            Some(marker) => Self::parse_input(&text[marker.end()..]),
        };

        ParsedPlan::Action {
            thought,
            action,
            input,
        }
    }

    /// First balanced `{...}` span in `text`, honoring JSON string escapes.
    pub fn first_json_object(text: &str) -> Option<&str> {
        let start = text.find('{')?;
        let mut depth = 0_usize;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, ch) in text[start..].char_indices() {
            if in_string {
                match ch {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match ch {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=start + offset]);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn parse_input(rest: &str) -> ActionInput {
        let raw_line = rest.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
        let Some(candidate) = Self::first_json_object(rest) else {
            return ActionInput::Invalid {
                raw: raw_line.to_string(),
                error: "no JSON object after Action Input".into(),
            };
        };
        match serde_json::from_str::<Value>(candidate) {
            Ok(value @ Value::Object(_)) => ActionInput::Args(value),
            Ok(_) => ActionInput::Invalid {
                raw: candidate.to_string(),
                error: "Action Input must be a JSON object".into(),
            },
            Err(error) => ActionInput::Invalid {
                raw: candidate.to_string(),
                error: format!("invalid JSON: {error}"),
            },
        }
    }

    fn thought(text: &str) -> Option<String> {
        let marker = THOUGHT.find(text)?;
        let rest = &text[marker.end()..];
        let end = [&*ACTION, &*ACTION_INPUT, &*FINAL_ANSWER]
            .iter()
            .filter_map(|re| re.find(rest).map(|m| m.start()))
            .min()
            .unwrap_or(rest.len());
        let thought = rest[..end].trim();
        (!thought.is_empty()).then(|| thought.to_string())
    }
}

fn clean_action_name(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '`' || c == '"' || c == '\'')
        .trim()
        .to_string()
}
