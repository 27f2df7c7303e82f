use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScratchpadEntry {
    Step {
        thought: Option<String>,
        action: String,
        input: Value,
        observation: String,
    },
    /// Planner text that parsed as neither an action nor a final answer.
    Note { thought: String },
    FinalAnswer { thought: Option<String>, answer: String },
}

/// Append-only trace of one reasoning run. Entries are never reordered or
/// removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scratchpad {
    entries: Vec<ScratchpadEntry>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ScratchpadEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ScratchpadEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.entries.iter().rev().find_map(|entry| match entry {
            ScratchpadEntry::FinalAnswer { answer, .. } => Some(answer.as_str()),
            _ => None,
        })
    }

    /// Render as planner-grammar text for the next prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                ScratchpadEntry::Step {
                    thought,
                    action,
                    input,
                    observation,
                } => {
                    if let Some(thought) = thought {
                        out.push_str(&format!("Thought: {thought}\n"));
                    }
                    out.push_str(&format!("Action: {action}\nAction Input: {input}\n"));
                    out.push_str(&format!("Observation: {observation}\n"));
                }
                ScratchpadEntry::Note { thought } => {
                    out.push_str(&format!("Thought: {thought}\n"));
                }
                ScratchpadEntry::FinalAnswer { thought, answer } => {
                    if let Some(thought) = thought {
                        out.push_str(&format!("Thought: {thought}\n"));
                    }
                    out.push_str(&format!("Final Answer: {answer}\n"));
                }
            }
        }
        out
    }
}
