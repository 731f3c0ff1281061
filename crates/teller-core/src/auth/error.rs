use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(&'static str),
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        SessionError::RefreshFailed(err.to_string())
    }
}

/// Failures reported by a durable token storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt storage file: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}
