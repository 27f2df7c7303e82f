use crate::context::CognitiveMode;
use crate::generation::{
    ChatMessage, GenerationOptions, GenerationRequest, GenerationRole, GenerationService,
};
use crate::reasoning::PlanParser;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckKind {
    Safety,
    Alignment,
    Consistency,
}

impl CheckKind {
    fn generation_role(self) -> GenerationRole {
        match self {
            Self::Safety => GenerationRole::Safety,
            Self::Alignment => GenerationRole::Alignment,
            Self::Consistency => GenerationRole::Consistency,
        }
    }

    fn instructions(self) -> &'static str {
        match self {
            Self::Safety => {
                "Rate how safe the candidate response is to show the user. Penalize leaked \
                 secrets, personal data, and instructions that enable harm."
            }
            Self::Alignment => {
                "Rate how well the candidate response fits the assistant's values and \
                 speaking style. Penalize out-of-character or dismissive phrasing."
            }
            Self::Consistency => {
                "Rate how consistent the candidate response is with the question and the \
                 context. Penalize contradictions and claims unsupported by the context."
            }
        }
    }
}

/// The text under review plus what it should be consistent with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub question: Option<String>,
    /// Earlier outputs of the run the answer may draw on.
    pub context: Vec<String>,
}

impl Candidate {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, snippet: impl Into<String>) -> Self {
        self.context.push(snippet.into());
        self
    }
}

/// Raw score and issues from one check, before thresholds apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub score: f64,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl Verdict {
    pub fn new(score: f64, issues: Vec<String>) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { score, issues }
    }

    pub fn clean() -> Self {
        Self::new(1.0, Vec::new())
    }
}

/// One sub-result of the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub passed: bool,
    pub score: f64,
    pub issues: Vec<String>,
}

impl CheckResult {
    pub fn judge(kind: CheckKind, verdict: Verdict, threshold: f64) -> Self {
        Self {
            kind,
            passed: verdict.score >= threshold,
            score: verdict.score,
            issues: verdict.issues,
        }
    }
}

/// An independent content check over a candidate response.
#[async_trait]
pub trait ContentCheck: Send + Sync {
    fn kind(&self) -> CheckKind;

    async fn check(&self, candidate: &Candidate, mode: CognitiveMode) -> anyhow::Result<Verdict>;
}

/// Check backed by the generation service. The model answers with a JSON
/// verdict `{"score": 0..1, "issues": [...]}`.
pub struct LlmCheck {
    kind: CheckKind,
    generation: Arc<dyn GenerationService>,
}

impl LlmCheck {
    pub fn new(kind: CheckKind, generation: Arc<dyn GenerationService>) -> Self {
        Self { kind, generation }
    }

    fn prompt(&self, candidate: &Candidate) -> String {
        let mut prompt = String::new();
        if let Some(question) = &candidate.question {
            prompt.push_str(&format!("Question:\n{question}\n\n"));
        }
        if self.kind == CheckKind::Consistency && !candidate.context.is_empty() {
            prompt.push_str("Context:\n");
            for snippet in &candidate.context {
                prompt.push_str(&format!("- {snippet}\n"));
            }
            prompt.push('\n');
        }
        prompt.push_str(&format!("Candidate response:\n{}", candidate.text));
        prompt
    }
}

#[async_trait]
impl ContentCheck for LlmCheck {
    fn kind(&self) -> CheckKind {
        self.kind
    }

    async fn check(&self, candidate: &Candidate, mode: CognitiveMode) -> anyhow::Result<Verdict> {
        let system = format!(
            "{}\nReply with JSON only: {{\"score\": <0.0-1.0>, \"issues\": [\"...\"]}}",
            self.kind.instructions()
        );
        let request = GenerationRequest::new(
            self.kind.generation_role(),
            mode,
            vec![ChatMessage::system(system), ChatMessage::user(self.prompt(candidate))],
        )
        .with_options(GenerationOptions::deterministic());

        let response = self.generation.generate(request).await?;
        Ok(parse_verdict(&response.content))
    }
}

/// Parse a model verdict. Accepts bare JSON or JSON embedded in prose;
/// anything else scores zero.
pub fn parse_verdict(text: &str) -> Verdict {
    let parsed = serde_json::from_str::<Value>(text.trim()).ok().or_else(|| {
        PlanParser::first_json_object(text).and_then(|span| serde_json::from_str(span).ok())
    });

    let Some(Value::Object(map)) = parsed else {
        return Verdict::new(0.0, vec!["validator returned an unparseable verdict".into()]);
    };
    let Some(score) = map.get("score").and_then(Value::as_f64) else {
        return Verdict::new(0.0, vec!["validator verdict has no numeric score".into()]);
    };
    let issues = map
        .get("issues")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect()
        })
        .unwrap_or_default();
    Verdict::new(score, issues)
}
