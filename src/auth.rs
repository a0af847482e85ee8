//! Token model, scope sets, and the layered token sources that feed `Authorization` headers.
//!
//! A [`TokenFlow`] produces tokens (client credentials, user flow, refresh). Flows compose:
//! [`FileTokenCache`] persists the result between invocations, [`TimedTokenFlow`] logs how long
//! each fetch took, and [`ReuseTokenSource`] turns the stack into a [`TokenSource`] that reuses
//! the in-memory token until it expires.

pub mod cache;
pub mod oidc;
pub mod scope;
pub mod source;
pub mod token;

pub use cache::*;
pub use oidc::*;
pub use scope::*;
pub use source::*;
pub use token::*;
