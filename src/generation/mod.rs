pub mod types;

pub use types::{
    ChatMessage, GenerationOptions, GenerationRequest, GenerationResponse, GenerationRole,
    MessageRole,
};

use async_trait::async_trait;

/// Text generation collaborator. Provider integration lives with the host.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> anyhow::Result<GenerationResponse>;

    fn name(&self) -> &str {
        "generation"
    }
}

/// Flatten a transcript into `Role: text` lines.
pub fn messages_to_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .filter(|msg| !msg.content.trim().is_empty())
        .map(|msg| {
            let label = match msg.role {
                MessageRole::System => "System:",
                MessageRole::User => "User:",
                MessageRole::Assistant => "Assistant:",
            };
            format!("{label} {}", msg.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
