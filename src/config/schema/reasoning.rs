use crate::reasoning::TrustLevel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Absolute ceiling on plan/act iterations regardless of config.
pub const REASONING_ITERATION_HARD_CAP: u32 = 25;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub max_iterations: u32,
    /// Retries after the first attempt, for retryable failures only.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub trust_level: TrustLevel,
    /// Rewrite synthesized answers in the configured persona voice.
    pub persona_voice: bool,
    /// Pause between iterations.
    pub iteration_delay_ms: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_retries: 2,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 5_000,
            trust_level: TrustLevel::Supervised,
            persona_voice: false,
            iteration_delay_ms: 0,
        }
    }
}

impl ReasoningConfig {
    pub fn effective_max_iterations(&self) -> u32 {
        self.max_iterations.min(REASONING_ITERATION_HARD_CAP)
    }

    pub fn iteration_delay(&self) -> Duration {
        Duration::from_millis(self.iteration_delay_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_iterations == 0 {
            anyhow::bail!("reasoning.max_iterations must be at least 1");
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            anyhow::bail!(
                "reasoning.initial_backoff_ms ({}) must not exceed reasoning.max_backoff_ms ({})",
                self.initial_backoff_ms,
                self.max_backoff_ms
            );
        }
        Ok(())
    }
}
