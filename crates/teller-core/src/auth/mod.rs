//! Authentication module for managing the user session and its tokens.
//!
//! This module provides:
//! - `SessionStore`: the single authority for the current credential pair
//! - `TokenLifecycle`: expiry classification and the refresh exchange
//! - `Bootstrap`: the startup pipeline that turns persisted tokens into an
//!   authenticated or unauthenticated decision
//! - `TokenStorage` backends for the persisted pair (keychain, file, memory)
//!
//! Access tokens are refreshed proactively when they are within 5 minutes
//! of expiry; anything that cannot be validated or renewed signs the user out.

pub mod bootstrap;
pub mod claims;
pub mod credentials;
pub mod error;
pub mod lifecycle;
pub mod session;

pub use bootstrap::{AuthDecision, Bootstrap};
pub use claims::{Claims, ClaimsDecoder, UnverifiedDecoder};
pub use credentials::{
    FileStorage, KeyringStorage, MemoryStorage, TokenStorage, REFRESH_TOKEN_KEY, TOKEN_KEY,
};
pub use error::{SessionError, StorageError};
pub use lifecycle::{classify_expiry, TokenLifecycle, TokenRefresher, TokenStatus};
pub use session::{AuthState, AuthStateReceiver, Credential, Persistence, Session, SessionStore};
