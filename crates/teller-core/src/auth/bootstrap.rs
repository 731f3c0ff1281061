//! Startup orchestration: hydrate, classify, refresh, commit.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::lifecycle::{TokenLifecycle, TokenRefresher, TokenStatus};
use super::session::{Credential, SessionStore};

/// Final routing decision handed to the navigation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Authenticated { subject_id: String },
    Unauthenticated,
}

impl AuthDecision {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthDecision::Authenticated { .. })
    }
}

/// Runs once per process, before any authenticated view is shown.
///
/// Every stage is awaited before the next starts, and every failure ends
/// in `logout`, so an unverifiable token never yields an authenticated
/// decision.
pub struct Bootstrap<'a, R> {
    store: &'a SessionStore,
    lifecycle: &'a TokenLifecycle<R>,
}

impl<'a, R: TokenRefresher> Bootstrap<'a, R> {
    pub fn new(store: &'a SessionStore, lifecycle: &'a TokenLifecycle<R>) -> Self {
        Self { store, lifecycle }
    }

    pub async fn run_now(self) -> AuthDecision {
        self.run(Utc::now()).await
    }

    /// Consumes the bootstrap so the decision is produced exactly once.
    pub async fn run(self, now: DateTime<Utc>) -> AuthDecision {
        let credential = match self.store.hydrate().await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                info!("No persisted session");
                return self.sign_out().await;
            }
            Err(e) => {
                warn!(error = %e, "Could not read persisted session");
                return self.sign_out().await;
            }
        };

        match self.lifecycle.classify(credential.access_token(), now) {
            TokenStatus::Expired => {
                info!("Persisted access token expired");
                self.sign_out().await
            }
            TokenStatus::NearExpiry => {
                info!("Persisted access token near expiry, refreshing");
                match self.lifecycle.refresh(credential.refresh_token()).await {
                    Ok(tokens) => match tokens.into_credential(credential.refresh_token()) {
                        Ok(renewed) => self.commit(renewed).await,
                        Err(e) => {
                            warn!(error = %e, "Refresh returned an unusable credential, signing out");
                            self.sign_out().await
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "Refresh failed, signing out");
                        self.sign_out().await
                    }
                }
            }
            TokenStatus::Fresh => self.commit(credential).await,
        }
    }

    async fn commit(&self, credential: Credential) -> AuthDecision {
        let (access_token, refresh_token) = credential.into_parts();
        if let Err(e) = self.store.authenticate(access_token, refresh_token).await {
            warn!(error = %e, "Could not commit session, signing out");
            return self.sign_out().await;
        }
        self.decide()
    }

    async fn sign_out(&self) -> AuthDecision {
        self.store.logout().await;
        self.decide()
    }

    fn decide(&self) -> AuthDecision {
        let session = self.store.current();
        let decision = if session.is_authenticated() {
            AuthDecision::Authenticated {
                subject_id: session.subject_id().to_string(),
            }
        } else {
            AuthDecision::Unauthenticated
        };
        info!(authenticated = decision.is_authenticated(), "Bootstrap complete");
        decision
    }
}
