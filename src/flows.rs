//! OAuth 2.0 grant flows that produce tokens for the client.
//!
//! Each flow implements [`TokenFlow`](crate::auth::TokenFlow) and is normally wrapped by the
//! cache and reuse layers in [`auth`](crate::auth).

pub mod client_credentials;
pub mod user;

pub use client_credentials::*;
pub use user::*;

/// Cache name for client-credentials tokens.
pub const CLIENT_CACHE_NAME: &str = "client";
/// Cache name for user-flow tokens.
pub const USER_CACHE_NAME: &str = "user";
