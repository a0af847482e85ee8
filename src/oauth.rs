//! Internal OAuth client facade over the `oauth2` crate.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	ExtraTokenFields, HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken,
	RequestTokenError, Scope, StandardRevocableToken, StandardTokenResponse, TokenResponse,
	TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{IssuedToken, ScopeSet, Token, TokenSecret},
	error::{ConfigError, TokenError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
	obs::{self, CallKind},
};

/// Default authorization endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://auth.zvelo.com/oauth2/auth";
/// Default token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://auth.zvelo.com/oauth2/token";

/// Extra token response fields carrying the OpenID Connect ID token.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// Raw ID token (JWT), when the `openid` scope was granted.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

type FacadeTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;
type ConfiguredClient = oauth2::Client<
	BasicErrorResponse,
	FacadeTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type FacadeRequestError = RequestTokenError<HttpClientError<ReqwestError>, BasicErrorResponse>;

/// Authorization and token endpoint pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OAuthEndpoints {
	/// Authorization endpoint used by the user flow.
	pub authorization: Url,
	/// Token endpoint used by every grant.
	pub token: Url,
}
impl OAuthEndpoints {
	/// Parses both endpoints.
	pub fn new(authorization: &str, token: &str) -> Result<Self, ConfigError> {
		let parse = |field, value: &str| {
			Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
				field,
				value: value.to_owned(),
				source,
			})
		};

		Ok(Self { authorization: parse("auth", authorization)?, token: parse("token", token)? })
	}
}

/// Grants the facade performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Grant {
	ClientCredentials,
	AuthorizationCode,
	RefreshToken,
}
impl Grant {
	const fn as_str(self) -> &'static str {
		match self {
			Grant::ClientCredentials => "client_credentials",
			Grant::AuthorizationCode => "authorization_code",
			Grant::RefreshToken => "refresh_token",
		}
	}
}

pub(crate) struct OAuthFacade {
	oauth_client: ConfiguredClient,
	http_client: ReqwestHttpClient,
}
impl OAuthFacade {
	pub(crate) fn new(
		endpoints: &OAuthEndpoints,
		client_id: &str,
		client_secret: Option<&str>,
		http_client: ReqwestHttpClient,
	) -> Result<Self> {
		let auth_url = AuthUrl::from_url(endpoints.authorization.clone());
		let token_url = TokenUrl::from_url(endpoints.token.clone());
		let mut oauth_client: ConfiguredClient = oauth2::Client::new(ClientId::new(
			client_id.to_owned(),
		))
		.set_auth_uri(auth_url)
		.set_token_uri(token_url);

		if let Some(secret) = client_secret.filter(|secret| !secret.is_empty()) {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.to_owned()));
		}

		Ok(Self { oauth_client, http_client })
	}

	pub(crate) async fn exchange_client_credentials(
		&self,
		scope: &ScopeSet,
	) -> Result<IssuedToken> {
		let meta = ResponseMetadataSlot::default();

		obs::observe(CallKind::Token, "client_credentials", async {
			let instrumented = self.http_client.instrumented(meta.clone());
			let mut request = self.oauth_client.exchange_client_credentials();

			for value in scope.iter() {
				request = request.add_scope(Scope::new(value.to_owned()));
			}

			let response = request
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(Grant::ClientCredentials, meta.take(), err))?;

			map_token_response(response, None)
		})
		.await
	}

	pub(crate) async fn exchange_code(
		&self,
		code: &str,
		pkce_verifier: &str,
		redirect_uri: &Url,
	) -> Result<IssuedToken> {
		let meta = ResponseMetadataSlot::default();

		obs::observe(CallKind::Token, "authorization_code", async {
			let instrumented = self.http_client.instrumented(meta.clone());
			let redirect_url = RedirectUrl::from_url(redirect_uri.clone());
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url))
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(Grant::AuthorizationCode, meta.take(), err))?;

			map_token_response(response, None)
		})
		.await
	}

	pub(crate) async fn refresh(
		&self,
		refresh_token: &TokenSecret,
		scope: &ScopeSet,
	) -> Result<IssuedToken> {
		let meta = ResponseMetadataSlot::default();

		obs::observe(CallKind::Token, "refresh_token", async {
			let instrumented = self.http_client.instrumented(meta.clone());
			let secret = RefreshToken::new(refresh_token.expose().to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&secret);

			for value in scope.iter() {
				request = request.add_scope(Scope::new(value.to_owned()));
			}

			let response = request
				.request_async(&instrumented)
				.await
				.map_err(|err| map_request_error(Grant::RefreshToken, meta.take(), err))?;

			map_token_response(response, Some(refresh_token))
		})
		.await
	}
}

fn map_token_response(
	response: FacadeTokenResponse,
	previous_refresh: Option<&TokenSecret>,
) -> Result<IssuedToken> {
	let expiry = match response.expires_in() {
		Some(expires_in) => {
			let secs =
				i64::try_from(expires_in.as_secs()).map_err(|_| TokenError::ExpiresInOutOfRange)?;

			Some(
				OffsetDateTime::now_utc()
					.checked_add(Duration::seconds(secs))
					.ok_or(TokenError::ExpiresInOutOfRange)?,
			)
		},
		None => None,
	};
	let refresh_token = response
		.refresh_token()
		.map(|token| TokenSecret::new(token.secret().to_owned()))
		.or_else(|| previous_refresh.cloned());
	let token = Token {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		token_type: response.token_type().as_ref().to_owned(),
		refresh_token,
		expiry,
	};

	Ok(IssuedToken { token, id_token: response.extra_fields().id_token.clone() })
}

fn map_request_error(
	grant: Grant,
	meta: Option<ResponseMetadata>,
	err: FacadeRequestError,
) -> Error {
	let status = meta.as_ref().and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => {
			let reason = match response.error_description() {
				Some(description) => format!("{}: {description}", response.error().as_ref()),
				None => response.error().as_ref().to_owned(),
			};

			TokenError::Rejected { grant: grant.as_str(), reason }.into()
		},
		RequestTokenError::Request(error) => map_transport_error(status, error),
		RequestTokenError::Parse(source, _body) =>
			TokenError::ResponseParse { source, status }.into(),
		RequestTokenError::Other(message) => TokenError::Endpoint { message, status }.into(),
	}
}

fn map_transport_error(status: Option<u16>, err: HttpClientError<ReqwestError>) -> Error {
	match err {
		HttpClientError::Reqwest(inner) =>
			if inner.is_builder() {
				ConfigError::from(*inner).into()
			} else {
				TransportError::from(*inner).into()
			},
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TokenError::Endpoint { message, status }.into(),
		_ => TokenError::Endpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status,
		}
		.into(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn endpoints_reject_invalid_urls() {
		let err = OAuthEndpoints::new("not a url", DEFAULT_TOKEN_URL)
			.expect_err("Invalid authorization URL should be rejected.");

		assert!(matches!(err, ConfigError::InvalidUrl { field: "auth", .. }));
		assert!(OAuthEndpoints::new(DEFAULT_AUTH_URL, DEFAULT_TOKEN_URL).is_ok());
	}

	#[test]
	fn builds_client_with_and_without_secret() {
		let endpoints = OAuthEndpoints::new(DEFAULT_AUTH_URL, DEFAULT_TOKEN_URL)
			.expect("Default endpoints should parse.");

		assert!(
			OAuthFacade::new(&endpoints, "client", Some("secret"), ReqwestHttpClient::default())
				.is_ok()
		);
		assert!(OAuthFacade::new(&endpoints, "public", None, ReqwestHttpClient::default()).is_ok());
	}

	#[test]
	fn token_response_keeps_previous_refresh_and_id_token() {
		let raw = serde_json::json!({
			"access_token": "at",
			"token_type": "bearer",
			"expires_in": 3600,
			"id_token": "a.b.c"
		});
		let response: FacadeTokenResponse =
			serde_json::from_value(raw).expect("Token response fixture should deserialize.");
		let previous = TokenSecret::new("rt");
		let issued = map_token_response(response, Some(&previous))
			.expect("Token response should map into an issued token.");

		assert_eq!(issued.token.access_token.expose(), "at");
		assert_eq!(issued.token.refresh_token, Some(previous));
		assert_eq!(issued.id_token.as_deref(), Some("a.b.c"));
		assert!(issued.token.expiry.is_some());
		assert!(issued.is_valid());
	}
}
