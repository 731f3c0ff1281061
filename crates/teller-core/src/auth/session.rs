use std::fmt;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::claims::ClaimsDecoder;
use super::credentials::{TokenStorage, REFRESH_TOKEN_KEY, TOKEN_KEY};
use super::{SessionError, StorageError};

/// An issued access/refresh token pair. Never mutated; replaced wholesale.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    refresh_token: String,
}

impl Credential {
    /// Both tokens must be non-empty.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Result<Self, SessionError> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();
        if access_token.is_empty() {
            return Err(SessionError::InvalidArguments("access token must not be empty"));
        }
        if refresh_token.is_empty() {
            return Err(SessionError::InvalidArguments("refresh token must not be empty"));
        }
        Ok(Self {
            access_token,
            refresh_token,
        })
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn into_parts(self) -> (String, String) {
        (self.access_token, self.refresh_token)
    }
}

// Tokens are bearer secrets; keep them out of logs and panics.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Snapshot of the session as seen by readers.
#[derive(Debug, Clone, Default)]
pub struct Session {
    credential: Option<Arc<Credential>>,
    subject_id: String,
}

impl Session {
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// Decoded subject of the held access token, or empty.
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }
}

/// Navigation-facing authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No authenticate/logout has happened yet in this process
    Unknown,
    Unauthenticated,
    Authenticated,
}

/// Whether `authenticate` reached durable storage.
#[derive(Debug)]
pub enum Persistence {
    Durable,
    /// The in-memory session is current but the durable copy lags behind.
    MemoryOnly(StorageError),
}

impl Persistence {
    pub fn is_durable(&self) -> bool {
        matches!(self, Persistence::Durable)
    }
}

#[derive(Debug, Clone, Default)]
struct Held {
    credential: Option<Arc<Credential>>,
    resolved: bool,
}

impl Held {
    fn state(&self) -> AuthState {
        match (self.resolved, self.credential.is_some()) {
            (false, _) => AuthState::Unknown,
            (true, true) => AuthState::Authenticated,
            (true, false) => AuthState::Unauthenticated,
        }
    }
}

/// Receives authentication state transitions.
pub struct AuthStateReceiver {
    rx: watch::Receiver<Held>,
}

impl AuthStateReceiver {
    pub fn state(&self) -> AuthState {
        self.rx.borrow().state()
    }

    /// Whether a transition arrived that has not been seen yet.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait for the next transition. Errors only if the store was dropped.
    pub async fn changed(&mut self) -> Result<AuthState, watch::error::RecvError> {
        self.rx.changed().await?;
        Ok(self.rx.borrow_and_update().state())
    }
}

/// Single authority for who is signed in and with which tokens.
///
/// `authenticate` and `logout` are serialized, durable writes included, so
/// the final state is always the effect of the later call. Reads go through
/// the published snapshot and never wait on a writer.
pub struct SessionStore {
    storage: Arc<dyn TokenStorage>,
    decoder: Arc<dyn ClaimsDecoder>,
    write_lock: Mutex<()>,
    held: watch::Sender<Held>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn TokenStorage>, decoder: Arc<dyn ClaimsDecoder>) -> Self {
        let (held, _) = watch::channel(Held::default());
        Self {
            storage,
            decoder,
            write_lock: Mutex::new(()),
            held,
        }
    }

    /// Replace the session with a new token pair and persist it.
    ///
    /// Empty tokens are rejected without touching any state. A storage
    /// failure does not roll back the in-memory session; it is logged and
    /// returned as [`Persistence::MemoryOnly`].
    pub async fn authenticate(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Persistence, SessionError> {
        let credential = match Credential::new(access_token, refresh_token) {
            Ok(credential) => Arc::new(credential),
            Err(e) => {
                warn!(error = %e, "Ignoring authenticate call");
                return Err(e);
            }
        };

        let _guard = self.write_lock.lock().await;

        self.held.send_replace(Held {
            credential: Some(credential.clone()),
            resolved: true,
        });

        let to_persist = credential.clone();
        let persistence = match self.with_storage(move |storage| write_pair(storage, &to_persist)).await {
            Ok(()) => Persistence::Durable,
            Err(e) => {
                warn!(error = %e, "Failed to persist tokens, session kept in memory only");
                Persistence::MemoryOnly(e)
            }
        };
        info!(durable = persistence.is_durable(), "Session authenticated");
        Ok(persistence)
    }

    /// Clear the session and remove the persisted tokens. Idempotent.
    pub async fn logout(&self) {
        let _guard = self.write_lock.lock().await;

        let previous = self.held.send_replace(Held {
            credential: None,
            resolved: true,
        });

        let cleared = self
            .with_storage(|storage| {
                for key in [TOKEN_KEY, REFRESH_TOKEN_KEY] {
                    if let Err(e) = storage.remove(key) {
                        warn!(key, error = %e, "Failed to remove persisted token");
                    }
                }
                Ok(())
            })
            .await;
        if let Err(e) = cleared {
            warn!(error = %e, "Failed to clear persisted tokens");
        }

        if previous.credential.is_some() {
            info!("Session cleared");
        } else {
            debug!("Logout on an empty session");
        }
    }

    /// Current session snapshot. The subject is decoded on every read.
    pub fn current(&self) -> Session {
        let credential = self.held.borrow().credential.clone();
        let subject_id = credential
            .as_deref()
            .and_then(|c| self.decoder.decode(c.access_token()).ok())
            .map(|claims| claims.subject_id)
            .unwrap_or_default();
        Session {
            credential,
            subject_id,
        }
    }

    pub fn state(&self) -> AuthState {
        self.held.borrow().state()
    }

    pub fn subscribe(&self) -> AuthStateReceiver {
        AuthStateReceiver {
            rx: self.held.subscribe(),
        }
    }

    /// Read the persisted token pair without changing the session.
    ///
    /// A pair with either half missing or empty is reported as absent.
    pub async fn hydrate(&self) -> Result<Option<Credential>, SessionError> {
        let (access_token, refresh_token) = self
            .with_storage(|storage| Ok((storage.get(TOKEN_KEY)?, storage.get(REFRESH_TOKEN_KEY)?)))
            .await?;
        match (access_token, refresh_token) {
            (Some(access), Some(refresh)) => Ok(Credential::new(access, refresh).ok()),
            (Some(_), None) => {
                debug!("Persisted access token has no refresh token");
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Run a storage operation on the blocking pool.
    async fn with_storage<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn TokenStorage) -> Result<T, StorageError> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || op(storage.as_ref()))
            .await
            .map_err(|e| StorageError::Unavailable(format!("storage task failed: {}", e)))?
    }
}

/// Write both keys of a credential.
///
/// Storage must never pair one session's access token with another's
/// refresh token: when the refresh token cannot be written, the previous
/// access token is put back, or removed if there was none.
fn write_pair(storage: &dyn TokenStorage, credential: &Credential) -> Result<(), StorageError> {
    let previous_access = storage.get(TOKEN_KEY)?;
    storage.set(TOKEN_KEY, credential.access_token())?;

    if let Err(e) = storage.set(REFRESH_TOKEN_KEY, credential.refresh_token()) {
        let rolled_back = match previous_access {
            Some(previous) => storage
                .set(TOKEN_KEY, &previous)
                .or_else(|_| storage.remove(TOKEN_KEY)),
            None => storage.remove(TOKEN_KEY),
        };
        if let Err(rollback) = rolled_back {
            warn!(error = %rollback, "Failed to roll back persisted access token");
        }
        return Err(e);
    }
    Ok(())
}
