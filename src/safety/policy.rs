use serde::{Deserialize, Serialize};

/// How much validation a mode's candidate responses receive.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidationLevel {
    /// All three checks concurrently, plus refinement on failure.
    #[default]
    Full,
    /// Only the safety check.
    SafetyOnly,
    /// Cheap heuristic variants of all three checks.
    Quick,
    /// Pass-through.
    None,
}

/// Per-mode gate policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    pub level: ValidationLevel,
    pub require_alignment: bool,
    pub require_consistency: bool,
    pub safety_threshold: f64,
    pub alignment_threshold: f64,
    pub consistency_threshold: f64,
    /// Lets a failed safety check through. Intended for operator debugging.
    pub allow_unsafe: bool,
    /// Phrases the alignment heuristic treats as out of character.
    pub forbidden_phrases: Vec<String>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            level: ValidationLevel::Full,
            require_alignment: true,
            require_consistency: true,
            safety_threshold: 0.9,
            alignment_threshold: 0.7,
            consistency_threshold: 0.7,
            allow_unsafe: false,
            forbidden_phrases: Vec::new(),
        }
    }
}

impl ValidationPolicy {
    pub fn pass_through() -> Self {
        Self {
            level: ValidationLevel::None,
            require_alignment: false,
            require_consistency: false,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: ValidationLevel) -> Self {
        self.level = level;
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("safety_threshold", self.safety_threshold),
            ("alignment_threshold", self.alignment_threshold),
            ("consistency_threshold", self.consistency_threshold),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                anyhow::bail!("validation.{name} must be within 0.0..=1.0, got {value}");
            }
        }
        Ok(())
    }
}
