use crate::context::CognitiveMode;
use serde::{Deserialize, Serialize};

/// Which part of the pipeline is asking. Hosts route roles to models/prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GenerationRole {
    Planner,
    Synthesizer,
    Persona,
    Safety,
    Alignment,
    Consistency,
    Refiner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

impl GenerationOptions {
    /// Low temperature for verdict-style calls that must parse as JSON.
    pub fn deterministic() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: Some(512),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub role: GenerationRole,
    pub messages: Vec<ChatMessage>,
    pub mode: CognitiveMode,
    #[serde(default)]
    pub options: GenerationOptions,
}

impl GenerationRequest {
    pub fn new(role: GenerationRole, mode: CognitiveMode, messages: Vec<ChatMessage>) -> Self {
        Self {
            role,
            messages,
            mode,
            options: GenerationOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Content of the last user message, if any.
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub content: String,
}

impl GenerationResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}
