use thiserror::Error;

/// Failures of the refresh exchange.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Refresh token rejected - sign in again")]
    RefreshRejected,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
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

    /// Map a non-success status from the refresh endpoint.
    ///
    /// 400, 401 and 403 all mean the grant itself was refused; anything else
    /// outside 5xx is unexpected for this endpoint.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 | 401 | 403 => ApiError::RefreshRejected,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}
