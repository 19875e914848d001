use thiserror::Error;

use crate::mapper::ValidationReport;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    /// The backend answered but reported a failure (e.g. unknown range).
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - credentials may be invalid or expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Transport not initialized: {0}")]
    Initialization(String),

    #[error("No transport configured")]
    NotConfigured,

    #[error("Validation failed: {0}")]
    Validation(ValidationReport),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl SourceError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => SourceError::Unauthorized,
            403 => SourceError::AccessDenied(truncated),
            404 => SourceError::NotFound(truncated),
            429 => SourceError::RateLimited,
            500..=599 => SourceError::ServerError(truncated),
            _ => SourceError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Map a reqwest failure, separating timeouts from other network errors.
    pub fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else {
            SourceError::Network(err)
        }
    }

    /// Transport-class failures may be retried or answered by a fallback
    /// transport or cache tier. Everything else propagates as-is.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SourceError::Network(_)
                | SourceError::Timeout
                | SourceError::ServerError(_)
                | SourceError::RateLimited
        )
    }

    /// Whether a fallback transport should be attempted after this error.
    pub fn allows_fallback(&self) -> bool {
        self.is_transport()
            || matches!(self, SourceError::Initialization(_) | SourceError::NotConfigured)
    }
}
