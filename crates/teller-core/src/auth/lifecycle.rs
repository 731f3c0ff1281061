//! Token time-validity classification and the refresh exchange.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::claims::ClaimsDecoder;
use super::SessionError;
use crate::api::{ApiError, RefreshedTokens};

/// Window before expiry during which a token is proactively refreshed (5 minutes)
pub const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 300;

/// Upper bound on a single refresh exchange.
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Expired,
    NearExpiry,
    Fresh,
}

/// Classify an expiry instant relative to `now`.
///
/// `Expired` when `expires_at <= now`, `NearExpiry` when
/// `now < expires_at <= now + threshold`, otherwise `Fresh`.
pub fn classify_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> TokenStatus {
    if expires_at <= now {
        TokenStatus::Expired
    } else if expires_at <= now + threshold {
        TokenStatus::NearExpiry
    } else {
        TokenStatus::Fresh
    }
}

/// The remote side of the refresh exchange.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ApiError>;
}

pub struct TokenLifecycle<R> {
    decoder: Arc<dyn ClaimsDecoder>,
    refresher: R,
    threshold: Duration,
    timeout: std::time::Duration,
}

impl<R: TokenRefresher> TokenLifecycle<R> {
    pub fn new(decoder: Arc<dyn ClaimsDecoder>, refresher: R) -> Self {
        Self {
            decoder,
            refresher,
            threshold: Duration::seconds(DEFAULT_REFRESH_THRESHOLD_SECS),
            timeout: std::time::Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
        }
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Classify an access token. A token that cannot be decoded is `Expired`.
    pub fn classify(&self, access_token: &str, now: DateTime<Utc>) -> TokenStatus {
        match self.decoder.decode(access_token) {
            Ok(claims) => classify_expiry(claims.expires_at, now, self.threshold),
            Err(e) => {
                warn!(error = %e, "Treating undecodable access token as expired");
                TokenStatus::Expired
            }
        }
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Every failure, including the timeout elapsing, is `RefreshFailed`.
    /// No retry is attempted.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, SessionError> {
        if refresh_token.is_empty() {
            return Err(SessionError::RefreshFailed("no refresh token held".to_string()));
        }

        debug!(timeout_ms = self.timeout.as_millis() as u64, "Refreshing access token");
        let tokens = tokio::time::timeout(self.timeout, self.refresher.refresh(refresh_token))
            .await
            .map_err(|_| {
                SessionError::RefreshFailed(format!("no response within {}ms", self.timeout.as_millis()))
            })??;

        if tokens.access_token.is_empty() {
            return Err(SessionError::RefreshFailed("server returned an empty access token".to_string()));
        }
        debug!(rotated = tokens.refresh_token.is_some(), "Access token refreshed");
        Ok(tokens)
    }
}
