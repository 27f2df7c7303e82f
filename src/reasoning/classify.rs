use serde::{Deserialize, Serialize};

/// Capability failure category. Exactly one applies to any error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorCategory {
    PathRestricted,
    ValidationFailed,
    FileNotFound,
    PermissionDenied,
    InvalidArgs,
    Timeout,
    NetworkError,
    Unknown,
}

impl ErrorCategory {
    /// Only transient categories are worth another identical attempt.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::NetworkError | Self::InvalidArgs)
    }

    pub fn suggestions(self) -> Vec<String> {
        let items: &[&str] = match self {
            Self::PathRestricted => &[
                "Use a path inside the allowed workspace.",
                "Ask an administrator to extend the allowed paths.",
            ],
            Self::ValidationFailed => &[
                "Check the request against the capability's documented inputs.",
            ],
            Self::FileNotFound => &[
                "Check the file name and location for typos.",
                "List the directory to confirm the file exists.",
            ],
            Self::PermissionDenied => &[
                "Raise the trust level or approve the action explicitly.",
                "Check file or account permissions.",
            ],
            Self::InvalidArgs => &["Review the arguments passed to the capability."],
            Self::Timeout => &[
                "Try again in a moment.",
                "Narrow the request so it completes faster.",
            ],
            Self::NetworkError => &[
                "Check the network connection.",
                "Try again once the remote service is reachable.",
            ],
            Self::Unknown => &["Try rephrasing the request."],
        };
        items.iter().map(|s| (*s).to_string()).collect()
    }
}

/// Error text from a failed capability call, decoupled from the concrete
/// error type that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescription {
    pub capability: String,
    pub message: String,
}

impl ErrorDescription {
    pub fn new(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub retryable: bool,
    pub suggestions: Vec<String>,
}

impl ErrorClassification {
    /// Plain-language explanation for the end user.
    pub fn user_message(&self, description: &ErrorDescription) -> String {
        let reason = match self.category {
            ErrorCategory::PathRestricted => "it tried to use a location that is off limits",
            ErrorCategory::ValidationFailed => "the request did not pass its checks",
            ErrorCategory::FileNotFound => "the file it needed does not exist",
            ErrorCategory::PermissionDenied => "it is not permitted at the current trust level",
            ErrorCategory::InvalidArgs => "it was given arguments it could not use",
            ErrorCategory::Timeout => "it took too long to respond",
            ErrorCategory::NetworkError => "a network connection failed",
            ErrorCategory::Unknown => "of an unexpected error",
        };
        let mut message = format!(
            "I couldn't complete '{}' because {reason} ({}).",
            description.capability, description.message
        );
        if let Some(first) = self.suggestions.first() {
            message.push(' ');
            message.push_str(first);
        }
        message
    }
}

type Predicate = fn(&str) -> bool;

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Ordered: the first matching predicate decides the category.
const RULES: &[(ErrorCategory, Predicate)] = &[
    (ErrorCategory::ValidationFailed, |m| {
        contains_any(m, &["capability not found", "unknown capability"])
    }),
    (ErrorCategory::PathRestricted, |m| {
        contains_any(
            m,
            &[
                "path restricted",
                "path not allowed",
                "outside the allowed",
                "outside allowed",
                "outside workspace",
                "restricted path",
            ],
        )
    }),
    (ErrorCategory::PermissionDenied, |m| {
        contains_any(
            m,
            &["permission denied", "eacces", "eperm", "forbidden", "unauthorized", "not permitted"],
        )
    }),
    (ErrorCategory::FileNotFound, |m| {
        contains_any(m, &["enoent", "not found", "no such file"])
    }),
    (ErrorCategory::Timeout, |m| {
        contains_any(m, &["timed out", "timeout", "etimedout", "deadline exceeded"])
    }),
    (ErrorCategory::NetworkError, |m| {
        contains_any(
            m,
            &[
                "econnrefused",
                "econnreset",
                "enotfound",
                "network",
                "fetch failed",
                "connection refused",
                "connection reset",
            ],
        )
    }),
    (ErrorCategory::InvalidArgs, |m| {
        contains_any(
            m,
            &[
                "invalid arg",
                "invalid param",
                "invalid input",
                "invalid json",
                "missing required",
                "missing field",
            ],
        )
    }),
    (ErrorCategory::ValidationFailed, |m| {
        contains_any(m, &["validation", "invalid", "rejected"])
    }),
];

/// Assign exactly one category by ordered substring match.
pub fn classify(description: &ErrorDescription) -> ErrorClassification {
    let lowered = description.message.to_lowercase();
    let category = RULES
        .iter()
        .find(|(_, matches)| matches(&lowered))
        .map_or(ErrorCategory::Unknown, |(category, _)| *category);

    ErrorClassification {
        category,
        retryable: category.is_retryable(),
        suggestions: category.suggestions(),
    }
}
