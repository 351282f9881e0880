//! Error taxonomy for the completion boundary

/// Failure of a completion call
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// No API key configured
    #[error("api key not configured: set {env_var}")]
    MissingApiKey {
        /// Environment variable the key is read from
        env_var: &'static str,
    },

    /// Network-level failure (connect, timeout, body read)
    #[error("transport error: {0}")]
    Transport(String),

    /// 401/403 from the service
    #[error("authentication failed: {0}")]
    Auth(String),

    /// 429 from the service
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// 5xx from the service
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// 4xx other than auth/rate-limit
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Structured output could not be parsed or failed schema validation
    #[error("schema validation failed: {0}")]
    Schema(String),
}

impl LlmError {
    /// Map an HTTP error status and body to an error variant
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::Auth(body.to_string()),
            429 => Self::RateLimited(body.to_string()),
            500..=599 => Self::Server {
                status,
                message: body.to_string(),
            },
            _ => Self::InvalidRequest(format!("http {status}: {body}")),
        }
    }

    /// Whether a retry could plausibly succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RateLimited(_) | Self::Server { .. }
        )
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(LlmError::from_status(401, "no"), LlmError::Auth(_)));
        assert!(matches!(
            LlmError::from_status(403, "no"),
            LlmError::Auth(_)
        ));
        assert!(matches!(
            LlmError::from_status(429, "slow down"),
            LlmError::RateLimited(_)
        ));
        assert!(matches!(
            LlmError::from_status(503, "oops"),
            LlmError::Server { status: 503, .. }
        ));
        assert!(matches!(
            LlmError::from_status(400, "bad"),
            LlmError::InvalidRequest(_)
        ));
    }

    #[test]
    fn retryability() {
        assert!(LlmError::from_status(429, "").is_retryable());
        assert!(LlmError::from_status(500, "").is_retryable());
        assert!(LlmError::Transport("reset".into()).is_retryable());
        assert!(!LlmError::from_status(401, "").is_retryable());
        assert!(!LlmError::Schema("bad".into()).is_retryable());
    }
}
