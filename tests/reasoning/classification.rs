use cognitive_pipeline::reasoning::{ErrorCategory, ErrorDescription, classify};

fn category_of(message: &str) -> ErrorCategory {
    classify(&ErrorDescription::new("lookup", message)).category
}

#[test]
fn category_table() {
    let table = [
        ("ENOENT: no such file or directory", ErrorCategory::FileNotFound),
        ("request timed out after 30s", ErrorCategory::Timeout),
        ("ETIMEDOUT", ErrorCategory::Timeout),
        ("connect ECONNREFUSED 127.0.0.1:443", ErrorCategory::NetworkError),
        ("fetch failed", ErrorCategory::NetworkError),
        ("EACCES: permission denied, open '/etc/shadow'", ErrorCategory::PermissionDenied),
        ("path not allowed: /root/.ssh", ErrorCategory::PathRestricted),
        ("invalid args: expected string for 'path'", ErrorCategory::InvalidArgs),
        ("missing required field 'query'", ErrorCategory::InvalidArgs),
        ("capability not found: teleport", ErrorCategory::ValidationFailed),
        ("schema validation rejected the payload", ErrorCategory::ValidationFailed),
        ("the flux capacitor overheated", ErrorCategory::Unknown),
    ];
    for (message, expected) in table {
        assert_eq!(category_of(message), expected, "message: {message}");
    }
}

#[test]
fn earlier_rules_win_on_overlap() {
    // Mentions both a restricted path and a missing file.
    assert_eq!(
        category_of("path restricted: file not found outside workspace"),
        ErrorCategory::PathRestricted
    );
    // Unknown capability beats the generic "not found".
    assert_eq!(
        category_of("capability not found"),
        ErrorCategory::ValidationFailed
    );
}

#[test]
fn only_transient_categories_are_retryable() {
    let all = [
        ErrorCategory::PathRestricted,
        ErrorCategory::ValidationFailed,
        ErrorCategory::FileNotFound,
        ErrorCategory::PermissionDenied,
        ErrorCategory::InvalidArgs,
        ErrorCategory::Timeout,
        ErrorCategory::NetworkError,
        ErrorCategory::Unknown,
    ];
    let retryable: Vec<_> = all.into_iter().filter(|c| c.is_retryable()).collect();
    assert_eq!(
        retryable,
        [
            ErrorCategory::InvalidArgs,
            ErrorCategory::Timeout,
            ErrorCategory::NetworkError
        ]
    );
}

#[test]
fn classification_carries_suggestions_and_user_message() {
    let description = ErrorDescription::new("lookup_file", "ENOENT: not found");
    let result = classify(&description);
    assert!(!result.retryable);
    assert!(!result.suggestions.is_empty());

    let message = result.user_message(&description);
    assert!(message.contains("lookup_file"));
    assert!(message.contains("ENOENT: not found"));
    assert!(message.contains(&result.suggestions[0]));
}

#[test]
fn categories_render_kebab_case() {
    assert_eq!(ErrorCategory::FileNotFound.to_string(), "file-not-found");
    assert_eq!(
        serde_json::to_value(ErrorCategory::NetworkError).unwrap(),
        "network-error"
    );
}
