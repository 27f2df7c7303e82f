use super::scratchpad::Scratchpad;
use crate::context::CognitiveMode;
use crate::generation::{ChatMessage, GenerationRequest, GenerationRole, GenerationService};
use std::sync::Arc;

const SYNTHESIS_PROMPT: &str = "Write the answer for the user from the reasoning trace \
below. Use only facts present in the observations. If a step failed, say so plainly.";

const PERSONA_PROMPT: &str = "Rewrite the answer in your own speaking voice. Keep every \
fact and caveat; change only tone and phrasing.";

/// Turns a finished scratchpad into the user-facing answer.
pub struct ResponseSynthesizer {
    generation: Arc<dyn GenerationService>,
    persona_voice: bool,
}

impl ResponseSynthesizer {
    pub fn new(generation: Arc<dyn GenerationService>, persona_voice: bool) -> Self {
        Self {
            generation,
            persona_voice,
        }
    }

    /// An explicit final answer is returned as-is; otherwise a narrative is
    /// composed from the full trace. The optional persona pass runs last.
    pub async fn synthesize(
        &self,
        question: &str,
        scratchpad: &Scratchpad,
        mode: CognitiveMode,
    ) -> anyhow::Result<String> {
        let answer = match scratchpad.final_answer() {
            Some(answer) => answer.to_string(),
            None => self.narrate(question, scratchpad, mode).await?,
        };

        if !self.persona_voice {
            return Ok(answer);
        }
        self.apply_persona(answer, mode).await
    }

    async fn narrate(
        &self,
        question: &str,
        scratchpad: &Scratchpad,
        mode: CognitiveMode,
    ) -> anyhow::Result<String> {
        let request = GenerationRequest::new(
            GenerationRole::Synthesizer,
            mode,
            vec![
                ChatMessage::system(SYNTHESIS_PROMPT),
                ChatMessage::user(format!(
                    "Question: {question}\n\nTrace:\n{}",
                    scratchpad.render()
                )),
            ],
        );
        let response = self.generation.generate(request).await?;
        Ok(response.content.trim().to_string())
    }

    /// Content transform, not a retry: a failure keeps the original answer.
    async fn apply_persona(&self, answer: String, mode: CognitiveMode) -> anyhow::Result<String> {
        let request = GenerationRequest::new(
            GenerationRole::Persona,
            mode,
            vec![ChatMessage::system(PERSONA_PROMPT), ChatMessage::user(answer.clone())],
        );
        match self.generation.generate(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                Ok(response.content.trim().to_string())
            }
            Ok(_) => Ok(answer),
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), "reasoning.persona_failed");
                Ok(answer)
            }
        }
    }
}
