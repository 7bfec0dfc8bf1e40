use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GithubError>;

#[derive(Debug, Error)]
pub enum GithubError {
    /// The credential was rejected. Terminal for the identity that owns it.
    #[error("credential rejected (401)")]
    AuthInvalid,

    /// Primary or secondary rate limit hit. Retryable after a pause.
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// The entity was removed or renamed. An absence signal, not
    /// necessarily a failure — callers decide.
    #[error("not found")]
    NotFound,

    /// Transport failure or server-side error. Retryable.
    #[error("network error: {0}")]
    Network(String),

    /// Any other non-2xx response. Not retryable.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Malformed response body.
    #[error("parse error: {0}")]
    Parse(String),
}

impl GithubError {
    /// Whether the retry loop should try the same call again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GithubError::RateLimited { .. } | GithubError::Network(_)
        )
    }
}

impl From<reqwest::Error> for GithubError {
    fn from(err: reqwest::Error) -> Self {
        GithubError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for GithubError {
    fn from(err: serde_json::Error) -> Self {
        GithubError::Parse(err.to_string())
    }
}

/// Map an HTTP status (plus rate-limit headers) onto the error taxonomy.
/// GitHub reports primary rate limits as 403 with `x-ratelimit-remaining: 0`
/// and secondary limits as 429, both optionally carrying `retry-after`.
pub(crate) fn classify_status(
    status: u16,
    retry_after: Option<Duration>,
    rate_limit_exhausted: bool,
    message: String,
) -> GithubError {
    match status {
        401 => GithubError::AuthInvalid,
        404 => GithubError::NotFound,
        429 => GithubError::RateLimited { retry_after },
        403 if rate_limit_exhausted => GithubError::RateLimited { retry_after },
        500..=599 => GithubError::Network(format!("server error {status}: {message}")),
        _ => GithubError::Api { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_and_not_found_are_terminal() {
        assert!(matches!(
            classify_status(401, None, false, String::new()),
            GithubError::AuthInvalid
        ));
        assert!(matches!(
            classify_status(404, None, false, String::new()),
            GithubError::NotFound
        ));
        assert!(!classify_status(401, None, false, String::new()).is_retryable());
    }

    #[test]
    fn rate_limits_carry_the_hint() {
        let err = classify_status(429, Some(Duration::from_secs(30)), false, String::new());
        match err {
            GithubError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(30)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn exhausted_403_is_a_rate_limit() {
        assert!(classify_status(403, None, true, String::new()).is_retryable());
        // A plain 403 (e.g. SAML enforcement) is not.
        assert!(matches!(
            classify_status(403, None, false, String::new()),
            GithubError::Api { status: 403, .. }
        ));
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(classify_status(502, None, false, "bad gateway".into()).is_retryable());
    }

    #[test]
    fn other_statuses_are_fatal() {
        let err = classify_status(422, None, false, "unprocessable".into());
        assert!(matches!(err, GithubError::Api { status: 422, .. }));
        assert!(!err.is_retryable());
    }
}
