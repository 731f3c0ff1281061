//! Teller core - session and token lifecycle for the Teller mobile client.
//!
//! The UI layers only ever look at [`auth::AuthState`] or the
//! [`auth::AuthDecision`] produced at startup; token handling stays here.

pub mod api;
pub mod auth;
pub mod config;

pub use config::{Config, StorageBackend};

#[cfg(test)]
pub(crate) mod test_support;
