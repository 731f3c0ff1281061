//! REST client for the Teller customer API.
//!
//! Only the credential exchange is consumed by the core: the refresh
//! endpoint trades a refresh token for a new access token (and, when the
//! server rotates them, a new refresh token).

pub mod client;
pub mod error;

pub use client::{ApiClient, RefreshedTokens};
pub use error::ApiError;
