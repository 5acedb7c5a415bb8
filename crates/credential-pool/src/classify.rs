//! Failure classification for provider errors
//!
//! Distinguishes rate-limit signals (the sole trigger for credential
//! rotation) from fatal failures. The rule set lives here and nowhere else;
//! call sites never inspect status codes or message text themselves.

use provider::ProviderError;

/// Rate-limit message patterns in provider error payloads.
///
/// Some deployments wrap quota errors in non-429 statuses, so the body is
/// checked in addition to the status code.
const RATE_LIMIT_PATTERNS: &[&str] = &[
    "quota",
    "rate limit",
    "rate-limit",
    "resource exhausted",
    "resource_exhausted",
    "too many requests",
];

/// How the executor should react to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Rotate to the next credential.
    RateLimited,
    /// Abort and propagate the error unchanged.
    Fatal,
}

/// Classify a provider failure.
///
/// `RateLimited` iff the response carries HTTP 429 or the error body
/// contains a known quota/rate-limit phrase (case-insensitive). Transport
/// errors and malformed responses are fatal: retrying them on a different
/// credential would not help and would hide the original error.
pub fn classify_failure(error: &ProviderError) -> FailureClass {
    match error {
        ProviderError::Http { status: 429, .. } => FailureClass::RateLimited,
        ProviderError::Http { body, .. } => {
            let lower = body.to_lowercase();
            if RATE_LIMIT_PATTERNS.iter().any(|p| lower.contains(p)) {
                FailureClass::RateLimited
            } else {
                FailureClass::Fatal
            }
        }
        ProviderError::Transport(_) | ProviderError::InvalidResponse(_) => FailureClass::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, body: &str) -> ProviderError {
        ProviderError::Http {
            status,
            body: body.into(),
        }
    }

    #[test]
    fn status_429_any_body() {
        assert_eq!(
            classify_failure(&http(429, "slow down")),
            FailureClass::RateLimited
        );
    }

    #[test]
    fn status_429_empty_body() {
        assert_eq!(classify_failure(&http(429, "")), FailureClass::RateLimited);
    }

    #[test]
    fn quota_in_body_overrides_status() {
        let body = r#"{"error":{"message":"Quota exceeded for this project"}}"#;
        assert_eq!(classify_failure(&http(500, body)), FailureClass::RateLimited);
    }

    #[test]
    fn resource_exhausted_in_body() {
        let body = r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(classify_failure(&http(503, body)), FailureClass::RateLimited);
    }

    #[test]
    fn rate_limit_phrase_case_insensitive() {
        let body = r#"{"error":{"message":"RATE LIMIT reached, retry later"}}"#;
        assert_eq!(classify_failure(&http(400, body)), FailureClass::RateLimited);
    }

    #[test]
    fn too_many_requests_phrase() {
        assert_eq!(
            classify_failure(&http(200, "too many requests from this key")),
            FailureClass::RateLimited
        );
    }

    #[test]
    fn bad_request_is_fatal() {
        let body = r#"{"error":{"message":"invalid argument: unknown model"}}"#;
        assert_eq!(classify_failure(&http(400, body)), FailureClass::Fatal);
    }

    #[test]
    fn content_policy_rejection_is_fatal() {
        let body = r#"{"error":{"message":"blocked by safety settings"}}"#;
        assert_eq!(classify_failure(&http(422, body)), FailureClass::Fatal);
    }

    #[test]
    fn server_error_without_signal_is_fatal() {
        assert_eq!(
            classify_failure(&http(500, "internal error")),
            FailureClass::Fatal
        );
    }

    #[test]
    fn transport_is_fatal() {
        assert_eq!(
            classify_failure(&ProviderError::Transport("connection refused".into())),
            FailureClass::Fatal
        );
    }

    #[test]
    fn invalid_response_is_fatal() {
        assert_eq!(
            classify_failure(&ProviderError::InvalidResponse("no parts".into())),
            FailureClass::Fatal
        );
    }
}
