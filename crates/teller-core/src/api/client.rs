//! API client for the Teller customer API.
//!
//! Only the credential exchange lives here. Requests carry a bounded timeout
//! and are never retried; a failed refresh is the caller's cue to sign out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ApiError;
use crate::auth::{Credential, SessionError, TokenRefresher};
use crate::config::Config;

/// Path of the refresh endpoint, relative to the API base URL
const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Tokens returned by the refresh endpoint.
///
/// `refresh_token` is only present when the server rotates refresh tokens.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedTokens {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl RefreshedTokens {
    /// The rotated refresh token, or `previous` when the server kept it.
    fn refresh_token_or<'a>(&'a self, previous: &'a str) -> &'a str {
        match self.refresh_token.as_deref() {
            Some(rotated) if !rotated.is_empty() => rotated,
            _ => previous,
        }
    }

    /// Build the credential that replaces the one whose refresh token was
    /// `previous_refresh`, keeping it unless the server rotated it.
    pub fn into_credential(self, previous_refresh: &str) -> Result<Credential, SessionError> {
        let refresh_token = self.refresh_token_or(previous_refresh).to_string();
        Credential::new(self.access_token, refresh_token)
    }
}

/// API client for the customer service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url, config.request_timeout_secs)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshedTokens, ApiError> {
        let url = self.url(REFRESH_PATH);
        debug!(url = %url, "Sending refresh request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let response = Self::check_response(response).await?;

        let tokens: RefreshedTokens = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", e)))?;

        if tokens.access_token.is_empty() {
            return Err(ApiError::InvalidResponse("refresh response has no access token".to_string()));
        }
        Ok(tokens)
    }

    fn map_send_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.timeout_secs)
        } else {
            ApiError::NetworkError(err)
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }
}

#[async_trait]
impl TokenRefresher for ApiClient {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, ApiError> {
        self.refresh_token(refresh_token).await
    }
}
