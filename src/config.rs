//! Resolved client configuration and the builders that turn it into live components.
//!
//! [`ClientConfig`] is plain data (the CLI fills it from flags and `ZVELO_*` variables). The
//! builder methods validate it and assemble the token stack, transports, and key getter.

// std
use std::path::PathBuf;
// self
use crate::{
	_prelude::*,
	auth::{
		FileTokenCache, OidcVerifier, ReuseTokenSource, ScopeSet, StaticTokenSource,
		TimedTokenFlow, TokenFlow, TokenSource,
	},
	error::ConfigError,
	flows::{CLIENT_CACHE_NAME, ClientCredentialsFlow, USER_CACHE_NAME, UserFlow},
	http::{HttpClientOptions, ReqwestHttpClient},
	httpsig::{HttpKeyGetter, Verifier},
	oauth::{DEFAULT_AUTH_URL, DEFAULT_TOKEN_URL, OAuthEndpoints},
	store::{DataDir, FileKeyCache, KeyCache, MemoryKeyCache},
	transport::{DEFAULT_GRPC_TARGET, DEFAULT_REST_BASE_URL, JsonTransport, RpcTransport, Transport},
};

/// Application name used for the data directory.
pub const DEFAULT_APP_NAME: &str = "zvelo";
/// Scope requested when none is configured.
pub const DEFAULT_SCOPE: &str = "zvelo.dataset";

/// How outbound calls authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialMode {
	/// No `Authorization` header.
	Disabled,
	/// A caller-supplied access token.
	Static(String),
	/// Client-credentials grant.
	ClientCredentials {
		/// OAuth client ID.
		client_id: String,
		/// OAuth client secret.
		client_secret: String,
	},
	/// Browser-based authorization code grant.
	User {
		/// OAuth client ID.
		client_id: String,
		/// Secret for confidential clients.
		client_secret: Option<String>,
	},
}
impl Debug for CredentialMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Disabled => f.write_str("Disabled"),
			Self::Static(_) => f.write_str("Static(<redacted>)"),
			Self::ClientCredentials { client_id, .. } =>
				f.debug_struct("ClientCredentials").field("client_id", client_id).finish(),
			Self::User { client_id, .. } =>
				f.debug_struct("User").field("client_id", client_id).finish(),
		}
	}
}

/// Credential flags.
#[derive(Clone)]
pub struct CredentialOptions {
	/// OAuth client ID.
	pub client_id: Option<String>,
	/// OAuth client secret.
	pub client_secret: Option<String>,
	/// Access token used verbatim.
	pub access_token: Option<String>,
	/// Authorize through the browser.
	pub use_user_credentials: bool,
	/// Send no credentials.
	pub mock_no_credentials: bool,
	/// Requested scopes.
	pub scopes: Vec<String>,
	/// Skip the on-disk token cache.
	pub no_cache_token: bool,
	/// Authorization endpoint.
	pub auth_url: String,
	/// Token endpoint.
	pub token_url: String,
	/// Issuer used to verify ID tokens.
	pub oidc_issuer: Option<String>,
	/// Redirect URI registered for the user flow.
	pub oauth2_callback_url: String,
	/// Address the user-flow redirect listener binds.
	pub oauth2_callback_addr: String,
	/// Print the authorize URL instead of opening a browser.
	pub oauth2_no_open_in_browser: bool,
}
impl CredentialOptions {
	/// Picks the credential mode, rejecting conflicting or incomplete flag sets.
	///
	/// `--mock-no-credentials`, `--access-token`, and `--use-user-credentials` are mutually
	/// exclusive; without any of them a client ID and secret are required.
	pub fn mode(&self) -> Result<CredentialMode, ConfigError> {
		let access_token = self.access_token.as_deref().filter(|token| !token.is_empty());
		let client_id = self.client_id.as_deref().filter(|id| !id.is_empty());
		let client_secret = self.client_secret.as_deref().filter(|secret| !secret.is_empty());
		let requested = [
			(self.mock_no_credentials, "--mock-no-credentials"),
			(access_token.is_some(), "--access-token"),
			(self.use_user_credentials, "--use-user-credentials"),
		]
		.into_iter()
		.filter_map(|(set, flag)| set.then_some(flag))
		.collect::<Vec<_>>();

		if let &[first, second, ..] = requested.as_slice() {
			return Err(ConfigError::ConflictingCredentials { first, second });
		}
		if self.mock_no_credentials {
			return Ok(CredentialMode::Disabled);
		}
		if let Some(token) = access_token {
			return Ok(CredentialMode::Static(token.to_owned()));
		}

		let client_id = client_id.ok_or(ConfigError::MissingCredentials)?.to_owned();

		if self.use_user_credentials {
			return Ok(CredentialMode::User {
				client_id,
				client_secret: client_secret.map(str::to_owned),
			});
		}

		let client_secret = client_secret.ok_or(ConfigError::MissingClientSecret)?.to_owned();

		Ok(CredentialMode::ClientCredentials { client_id, client_secret })
	}

	/// Normalized scopes, falling back to the default scope.
	pub fn scope_set(&self) -> Result<ScopeSet, ConfigError> {
		let scopes = if self.scopes.is_empty() {
			vec![DEFAULT_SCOPE.to_owned()]
		} else {
			self.scopes.clone()
		};

		Ok(ScopeSet::new(scopes)?)
	}

	/// Parsed authorization and token endpoints.
	pub fn endpoints(&self) -> Result<OAuthEndpoints, ConfigError> {
		OAuthEndpoints::new(&self.auth_url, &self.token_url)
	}
}
impl Default for CredentialOptions {
	fn default() -> Self {
		Self {
			client_id: None,
			client_secret: None,
			access_token: None,
			use_user_credentials: false,
			mock_no_credentials: false,
			scopes: Vec::new(),
			no_cache_token: false,
			auth_url: DEFAULT_AUTH_URL.into(),
			token_url: DEFAULT_TOKEN_URL.into(),
			oidc_issuer: None,
			oauth2_callback_url: crate::flows::DEFAULT_REDIRECT_URI.into(),
			oauth2_callback_addr: crate::flows::DEFAULT_LISTEN_ADDR.into(),
			oauth2_no_open_in_browser: false,
		}
	}
}
impl Debug for CredentialOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialOptions")
			.field("mode", &self.mode())
			.field("scopes", &self.scopes)
			.field("no_cache_token", &self.no_cache_token)
			.field("auth_url", &self.auth_url)
			.field("token_url", &self.token_url)
			.field("oidc_issuer", &self.oidc_issuer)
			.finish()
	}
}

/// Transport flags.
#[derive(Clone, Debug)]
pub struct TransportOptions {
	/// Use the JSON transport instead of RPC.
	pub rest: bool,
	/// JSON base URL.
	pub rest_base_url: String,
	/// RPC target.
	pub grpc_target: String,
	/// Plain-text connections.
	pub no_tls: bool,
	/// Accept any server certificate.
	pub tls_insecure_skip_verify: bool,
}
impl Default for TransportOptions {
	fn default() -> Self {
		Self {
			rest: false,
			rest_base_url: DEFAULT_REST_BASE_URL.into(),
			grpc_target: DEFAULT_GRPC_TARGET.into(),
			no_tls: false,
			tls_insecure_skip_verify: false,
		}
	}
}

/// Everything needed to build the client's components.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Credential flags.
	pub credentials: CredentialOptions,
	/// Transport flags.
	pub transport: TransportOptions,
	/// Application name for the data directory.
	pub app_name: String,
	/// Explicit data directory base.
	pub data_dir: Option<PathBuf>,
	/// Log token fetch timings.
	pub debug: bool,
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			credentials: CredentialOptions::default(),
			transport: TransportOptions::default(),
			app_name: DEFAULT_APP_NAME.into(),
			data_dir: None,
			debug: false,
		}
	}
}
impl ClientConfig {
	/// Resolves the per-user data directory.
	pub fn data_dir(&self) -> Result<DataDir, ConfigError> {
		DataDir::discover(&self.app_name, self.data_dir.clone())
	}

	/// Builds the shared HTTP client.
	pub fn http_client(&self) -> Result<ReqwestHttpClient, ConfigError> {
		ReqwestHttpClient::build(
			&HttpClientOptions::default()
				.with_insecure_skip_verify(self.transport.tls_insecure_skip_verify),
		)
	}

	/// Builds the token stack: flow, optional timing, optional file cache, reuse layer.
	///
	/// Returns `None` when credentials are disabled.
	pub fn token_source(&self, http: &ReqwestHttpClient) -> Result<Option<Arc<dyn TokenSource>>> {
		let credentials = &self.credentials;
		let (flow, cache_name): (Arc<dyn TokenFlow>, &str) = match credentials.mode()? {
			CredentialMode::Disabled => return Ok(None),
			CredentialMode::Static(token) =>
				return Ok(Some(Arc::new(StaticTokenSource::new(token)))),
			CredentialMode::ClientCredentials { client_id, client_secret } => (
				Arc::new(ClientCredentialsFlow::new(
					&credentials.endpoints()?,
					&client_id,
					&client_secret,
					credentials.scope_set()?,
					http.clone(),
				)?),
				CLIENT_CACHE_NAME,
			),
			CredentialMode::User { client_id, client_secret } => {
				let redirect_uri = Url::parse(&credentials.oauth2_callback_url).map_err(|source| {
					ConfigError::InvalidUrl {
						field: "oauth2 callback",
						value: credentials.oauth2_callback_url.clone(),
						source,
					}
				})?;
				let flow = UserFlow::new(
					&credentials.endpoints()?,
					&client_id,
					client_secret.as_deref(),
					credentials.scope_set()?,
					http.clone(),
				)?
				.with_redirect_uri(redirect_uri)
				.with_listen_addr(credentials.oauth2_callback_addr.clone())
				.with_open_browser(!credentials.oauth2_no_open_in_browser);

				(Arc::new(flow), USER_CACHE_NAME)
			},
		};
		let flow: Arc<dyn TokenFlow> =
			if self.debug { Arc::new(TimedTokenFlow::new(flow, "oauth2")) } else { flow };
		let flow: Arc<dyn TokenFlow> = if credentials.no_cache_token {
			flow
		} else {
			let cache =
				FileTokenCache::new(flow, &self.data_dir()?, cache_name, &credentials.scope_set()?);

			tracing::debug!(path = %cache.path().display(), "Caching tokens on disk.");

			Arc::new(cache)
		};

		Ok(Some(Arc::new(ReuseTokenSource::new(flow))))
	}

	/// Discovers the configured OpenID issuer, if any.
	pub async fn oidc_verifier(&self, http: &ReqwestHttpClient) -> Result<Option<OidcVerifier>> {
		let (Some(issuer), Some(client_id)) =
			(self.credentials.oidc_issuer.as_deref(), self.credentials.client_id.as_deref())
		else {
			return Ok(None);
		};
		let issuer = Url::parse(issuer).map_err(|source| ConfigError::InvalidUrl {
			field: "oidc issuer",
			value: issuer.to_owned(),
			source,
		})?;

		Ok(Some(OidcVerifier::discover(http, &issuer, client_id).await?))
	}

	/// Builds the JSON transport.
	pub fn json_transport(
		&self,
		http: &ReqwestHttpClient,
		tokens: Option<Arc<dyn TokenSource>>,
	) -> Result<JsonTransport, ConfigError> {
		let transport = JsonTransport::new(
			&self.transport.rest_base_url,
			!self.transport.no_tls,
			http.clone(),
		)?;

		Ok(match tokens {
			Some(tokens) => transport.with_token_source(tokens),
			None => transport,
		})
	}

	/// Builds the RPC transport.
	pub fn rpc_transport(
		&self,
		tokens: Option<Arc<dyn TokenSource>>,
	) -> Result<RpcTransport, ConfigError> {
		let transport = RpcTransport::new(
			&self.transport.grpc_target,
			!self.transport.no_tls,
			self.transport.tls_insecure_skip_verify,
		)?;

		Ok(match tokens {
			Some(tokens) => transport.with_token_source(tokens),
			None => transport,
		})
	}

	/// Builds whichever transport `--rest` selects.
	pub fn transport(
		&self,
		http: &ReqwestHttpClient,
		tokens: Option<Arc<dyn TokenSource>>,
	) -> Result<Arc<dyn Transport>, ConfigError> {
		if self.transport.rest {
			Ok(Arc::new(self.json_transport(http, tokens)?))
		} else {
			Ok(Arc::new(self.rpc_transport(tokens)?))
		}
	}

	/// Builds the callback signature verifier backed by a file or memory key cache.
	pub fn verifier(&self, http: &ReqwestHttpClient, key_cache: bool) -> Result<Verifier> {
		let cache: Arc<dyn KeyCache> = if key_cache {
			Arc::new(FileKeyCache::new(self.data_dir()?))
		} else {
			Arc::new(MemoryKeyCache::default())
		};
		let getter = HttpKeyGetter::new(http.0.clone()).with_cache(cache);

		Ok(Verifier::new(Arc::new(getter)))
	}
}
