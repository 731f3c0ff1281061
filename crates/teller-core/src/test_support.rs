//! Fakes shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};

use crate::api::{ApiError, RefreshedTokens};
use crate::auth::{MemoryStorage, StorageError, TokenRefresher, TokenStorage, REFRESH_TOKEN_KEY};

pub(crate) fn encode_segment(json: &str) -> String {
    URL_SAFE_NO_PAD.encode(json.as_bytes())
}

/// Build an unsigned token carrying `customerId` and `exp`.
pub(crate) fn make_token(subject: &str, expires_at: DateTime<Utc>) -> String {
    let header = encode_segment(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = encode_segment(
        &serde_json::json!({ "customerId": subject, "exp": expires_at.timestamp() }).to_string(),
    );
    format!("{}.{}.signature", header, payload)
}

enum Script {
    Succeed(RefreshedTokens),
    Fail,
    Hang,
}

pub(crate) struct ScriptedRefresher {
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl ScriptedRefresher {
    fn with(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn succeeding(access_token: &str, refresh_token: Option<&str>) -> Self {
        Self::with(Script::Succeed(RefreshedTokens {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
        }))
    }

    pub(crate) fn failing() -> Self {
        Self::with(Script::Fail)
    }

    pub(crate) fn hanging() -> Self {
        Self::with(Script::Hang)
    }

    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl TokenRefresher for ScriptedRefresher {
    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedTokens, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Succeed(tokens) => Ok(tokens.clone()),
            Script::Fail => Err(ApiError::RefreshRejected),
            Script::Hang => std::future::pending().await,
        }
    }
}

/// Storage whose every operation fails.
pub(crate) struct FailingStorage;

impl TokenStorage for FailingStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("disk on fire".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk on fire".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk on fire".to_string()))
    }
}

/// Memory storage that, once armed, rejects writes of the refresh token.
pub(crate) struct RefreshWriteFailingStorage {
    inner: MemoryStorage,
    armed: AtomicBool,
}

impl RefreshWriteFailingStorage {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryStorage::new(),
            armed: AtomicBool::new(false),
        }
    }

    pub(crate) fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl TokenStorage for RefreshWriteFailingStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if key == REFRESH_TOKEN_KEY && self.armed.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("keychain locked".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}
