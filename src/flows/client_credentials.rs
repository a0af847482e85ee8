//! Client Credentials grant.

// self
use crate::{
	_prelude::*,
	auth::{IssuedToken, ScopeSet, TokenFlow, TokenFuture},
	http::ReqwestHttpClient,
	oauth::{OAuthEndpoints, OAuthFacade},
};

/// Exchanges a client ID and secret for an access token.
///
/// The flow has nothing to refresh: every fetch performs a new `client_credentials` grant, so
/// callers wrap it in the cache and reuse layers to avoid redundant exchanges.
pub struct ClientCredentialsFlow {
	facade: OAuthFacade,
	scope: ScopeSet,
}
impl ClientCredentialsFlow {
	/// Builds the flow against `endpoints`.
	pub fn new(
		endpoints: &OAuthEndpoints,
		client_id: &str,
		client_secret: &str,
		scope: ScopeSet,
		http: ReqwestHttpClient,
	) -> Result<Self> {
		let facade = OAuthFacade::new(endpoints, client_id, Some(client_secret), http)?;

		Ok(Self { facade, scope })
	}
}
impl TokenFlow for ClientCredentialsFlow {
	fn fetch<'a>(&'a self, _previous: Option<&'a IssuedToken>) -> TokenFuture<'a> {
		Box::pin(async move { self.facade.exchange_client_credentials(&self.scope).await })
	}
}
impl Debug for ClientCredentialsFlow {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentialsFlow").field("scope", &self.scope).finish()
	}
}
