//! Cheap pattern-based variants of the three checks, used at the `quick`
//! validation level.

use super::checks::{Candidate, CheckKind, ContentCheck, Verdict};
use crate::context::CognitiveMode;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Token prefixes of common API keys and access tokens.
const SECRET_PREFIXES: &[(&str, &str)] = &[
    ("sk-", "API key"),
    ("ghp_", "GitHub personal access token"),
    ("github_pat_", "GitHub fine-grained token"),
    ("AKIA", "AWS access key"),
    ("xoxb-", "Slack bot token"),
    ("xoxp-", "Slack user token"),
    ("hf_", "Hugging Face token"),
    ("glpat-", "GitLab access token"),
    ("AIza", "Google API key"),
];

/// Minimum token length after the prefix before it counts as a secret.
const MIN_SECRET_TAIL: usize = 8;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("static regex")
});

static CARD_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:\d[ -]?){13,16}\b").expect("static regex"));

static US_SSN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("static regex"));

static PRIVATE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-----BEGIN (?:RSA |EC |OPENSSH )?PRIVATE KEY-----").expect("static regex")
});

static PASSWORD_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:password|passwd|api[_-]?key|secret)\s*[:=]\s*\S{6,}")
        .expect("static regex")
});

static HARMFUL_INSTRUCTIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:how to (?:make|build) (?:a )?(?:bomb|explosive|nerve agent)",
        r"|rm -rf /(?:\s|$)",
        r"|disable (?:the )?(?:antivirus|security camera)s?",
        r"|steal (?:credentials|passwords))",
    ))
    .expect("static regex")
});

static PERSONA_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:as an ai language model|as a large language model",
        r"|i am just an ai|i'm just an ai",
        r"|i do not have personal (?:opinions|feelings))\b",
    ))
    .expect("static regex")
});

static LEADING_CONTRADICTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:yes\b[^.!?]*[.!?]\s*no\b|no\b[^.!?]*[.!?]\s*yes\b)")
        .expect("static regex")
});

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z']{3,}").expect("static regex"));

fn scored(issues: Vec<(String, f64)>) -> Verdict {
    let penalty: f64 = issues.iter().map(|(_, weight)| weight).sum();
    Verdict::new(
        1.0 - penalty,
        issues.into_iter().map(|(issue, _)| issue).collect(),
    )
}

fn find_secret(text: &str) -> Option<&'static str> {
    SECRET_PREFIXES.iter().find_map(|&(prefix, kind)| {
        text.match_indices(prefix).find_map(|(start, _)| {
            let tail = text[start + prefix.len()..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
                .count();
            (tail >= MIN_SECRET_TAIL).then_some(kind)
        })
    })
}

/// Secrets, personal data and plainly harmful instructions.
#[derive(Debug, Default)]
pub struct HeuristicSafety;

impl HeuristicSafety {
    pub fn evaluate(text: &str) -> Verdict {
        let mut issues = Vec::new();
        if let Some(kind) = find_secret(text) {
            issues.push((format!("response contains what looks like a {kind}"), 0.6));
        }
        if PRIVATE_KEY.is_match(text) {
            issues.push(("response contains a private key".to_string(), 0.6));
        }
        if PASSWORD_ASSIGNMENT.is_match(text) {
            issues.push(("response contains a credential assignment".to_string(), 0.5));
        }
        if EMAIL.is_match(text) {
            issues.push(("response contains an email address".to_string(), 0.2));
        }
        if CARD_NUMBER.is_match(text) || US_SSN.is_match(text) {
            issues.push(("response contains an identity or card number".to_string(), 0.5));
        }
        if HARMFUL_INSTRUCTIONS.is_match(text) {
            issues.push(("response contains harmful instructions".to_string(), 1.0));
        }
        scored(issues)
    }
}

#[async_trait]
impl ContentCheck for HeuristicSafety {
    fn kind(&self) -> CheckKind {
        CheckKind::Safety
    }

    async fn check(&self, candidate: &Candidate, _mode: CognitiveMode) -> anyhow::Result<Verdict> {
        Ok(Self::evaluate(&candidate.text))
    }
}

/// Configured forbidden phrases and persona-breaking boilerplate.
#[derive(Debug, Default)]
pub struct HeuristicAlignment {
    forbidden_phrases: Vec<String>,
}

impl HeuristicAlignment {
    pub fn new(forbidden_phrases: Vec<String>) -> Self {
        let forbidden_phrases = forbidden_phrases
            .into_iter()
            .map(|phrase| phrase.trim().to_lowercase())
            .filter(|phrase| !phrase.is_empty())
            .collect();
        Self { forbidden_phrases }
    }

    pub fn evaluate(&self, text: &str) -> Verdict {
        let lowered = text.to_lowercase();
        let mut issues: Vec<(String, f64)> = self
            .forbidden_phrases
            .iter()
            .filter(|phrase| lowered.contains(phrase.as_str()))
            .map(|phrase| (format!("uses forbidden phrase '{phrase}'"), 0.5))
            .collect();
        if PERSONA_BREAK.is_match(text) {
            issues.push(("breaks character with assistant boilerplate".to_string(), 0.4));
        }
        scored(issues)
    }
}

#[async_trait]
impl ContentCheck for HeuristicAlignment {
    fn kind(&self) -> CheckKind {
        CheckKind::Alignment
    }

    async fn check(&self, candidate: &Candidate, _mode: CognitiveMode) -> anyhow::Result<Verdict> {
        Ok(self.evaluate(&candidate.text))
    }
}

/// Answers shorter than this many content words skip the grounding check.
const GROUNDING_MIN_WORDS: usize = 8;
const GROUNDING_MIN_OVERLAP: f64 = 0.1;

fn content_words(text: &str) -> HashSet<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Empty or self-contradicting answers, and answers sharing almost no
/// vocabulary with the question and context.
#[derive(Debug, Default)]
pub struct HeuristicConsistency;

impl HeuristicConsistency {
    pub fn evaluate(candidate: &Candidate) -> Verdict {
        let text = candidate.text.trim();
        if text.is_empty() {
            return Verdict::new(0.0, vec!["response is empty".into()]);
        }

        let mut issues = Vec::new();
        if LEADING_CONTRADICTION.is_match(text) {
            issues.push(("response answers both yes and no".to_string(), 0.5));
        }

        let reference: HashSet<String> = candidate
            .question
            .iter()
            .chain(candidate.context.iter())
            .flat_map(|snippet| content_words(snippet))
            .collect();
        let words = content_words(text);
        if !reference.is_empty() && words.len() >= GROUNDING_MIN_WORDS {
            let shared = words.iter().filter(|word| reference.contains(*word)).count();
            #[allow(clippy::cast_precision_loss)]
            let overlap = shared as f64 / words.len() as f64;
            if overlap < GROUNDING_MIN_OVERLAP {
                issues.push((
                    format!("response shares little with the context (overlap {overlap:.2})"),
                    0.4,
                ));
            }
        }
        scored(issues)
    }
}

#[async_trait]
impl ContentCheck for HeuristicConsistency {
    fn kind(&self) -> CheckKind {
        CheckKind::Consistency
    }

    async fn check(&self, candidate: &Candidate, _mode: CognitiveMode) -> anyhow::Result<Verdict> {
        Ok(Self::evaluate(candidate))
    }
}
