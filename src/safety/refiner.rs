use crate::context::CognitiveMode;
use crate::generation::{
    ChatMessage, GenerationOptions, GenerationRequest, GenerationRole, GenerationService,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const REFINE_PROMPT: &str = "Revise the response so it no longer has the listed issues. \
Preserve its meaning and every fact that is not itself a problem. Reply with the revised \
response only.";

/// Result of one refinement attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refinement {
    pub changed: bool,
    pub text: String,
    /// Issues the rewrite was asked to address. Empty when nothing changed.
    pub changes: Vec<String>,
}

impl Refinement {
    pub fn unchanged(text: impl Into<String>) -> Self {
        Self {
            changed: false,
            text: text.into(),
            changes: Vec::new(),
        }
    }
}

/// Rewrites a failed candidate to address flagged issues.
pub struct Refiner {
    generation: Arc<dyn GenerationService>,
}

impl Refiner {
    pub fn new(generation: Arc<dyn GenerationService>) -> Self {
        Self { generation }
    }

    /// A failed or empty rewrite keeps the original text.
    pub async fn refine(&self, text: &str, issues: &[String], mode: CognitiveMode) -> Refinement {
        let issue_list = if issues.is_empty() {
            "- did not meet the validation threshold".to_string()
        } else {
            issues
                .iter()
                .map(|issue| format!("- {issue}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let request = GenerationRequest::new(
            GenerationRole::Refiner,
            mode,
            vec![
                ChatMessage::system(REFINE_PROMPT),
                ChatMessage::user(format!("Issues:\n{issue_list}\n\nResponse:\n{text}")),
            ],
        )
        .with_options(GenerationOptions::deterministic());

        let rewritten = match self.generation.generate(request).await {
            Ok(response) => response.content.trim().to_string(),
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), "safety.refine_failed");
                return Refinement::unchanged(text);
            }
        };

        if rewritten.is_empty() || rewritten == text.trim() {
            return Refinement::unchanged(text);
        }
        Refinement {
            changed: true,
            text: rewritten,
            changes: issues.to_vec(),
        }
    }
}
