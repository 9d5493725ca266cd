//! Failure classification.
//!
//! The channel reports arbitrary free text on failure; this maps it onto a
//! small set of stable, operator-facing reasons so failures stay groupable.
//! Substring matching is lossy by nature, so this stays a narrow
//! best-effort categorizer, not a source of truth.

const GENERIC_MAX_CHARS: usize = 200;

/// Stable failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    LoginFailed,
    NetworkTimeout,
    ProfileNotFound,
    Generic,
}

/// Categorize channel error text. Case-insensitive keyword match, first
/// match wins in priority order: login, timeout, profile+not found.
pub fn classify(error_text: &str) -> FailureCategory {
    let lower = error_text.to_lowercase();
    if lower.contains("login") {
        FailureCategory::LoginFailed
    } else if lower.contains("timeout") {
        FailureCategory::NetworkTimeout
    } else if lower.contains("profile") && lower.contains("not found") {
        FailureCategory::ProfileNotFound
    } else {
        FailureCategory::Generic
    }
}

/// The operator-facing reason string recorded on the connection.
pub fn failure_reason(error_text: &str) -> String {
    match classify(error_text) {
        FailureCategory::LoginFailed => "Login/authentication failed".to_string(),
        FailureCategory::NetworkTimeout => "Network timeout".to_string(),
        FailureCategory::ProfileNotFound => "Profile not found or inaccessible".to_string(),
        FailureCategory::Generic => {
            let capped: String = error_text.chars().take(GENERIC_MAX_CHARS).collect();
            format!("Error: {capped}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_wins_over_other_keywords() {
        assert_eq!(
            classify("Login failed: request timeout"),
            FailureCategory::LoginFailed
        );
        assert_eq!(
            failure_reason("LOGIN challenge presented"),
            "Login/authentication failed"
        );
    }

    #[test]
    fn timeout_beats_profile_not_found() {
        assert_eq!(
            classify("timeout while loading profile, not found"),
            FailureCategory::NetworkTimeout
        );
        assert_eq!(failure_reason("Request Timeout after 120s"), "Network timeout");
    }

    #[test]
    fn profile_not_found_requires_both_keywords() {
        assert_eq!(
            classify("Profile page not found (404)"),
            FailureCategory::ProfileNotFound
        );
        // "profile" alone is not enough
        assert_eq!(classify("profile blocked"), FailureCategory::Generic);
        assert_eq!(classify("page not found"), FailureCategory::Generic);
    }

    #[test]
    fn generic_keeps_original_text_truncated() {
        let long = "x".repeat(400);
        let reason = failure_reason(&long);
        assert!(reason.starts_with("Error: "));
        assert_eq!(reason.chars().count(), "Error: ".chars().count() + 200);
    }
}
