//! OpenID Connect ID-token verification.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{DecodingKey, Validation, jwk::JwkSet};
// self
use crate::{_prelude::*, error::TokenError};

/// Claims carried by an ID token.
pub type IdTokenClaims = serde_json::Map<String, serde_json::Value>;

const DISCOVERY_PATH: &str = ".well-known/openid-configuration";

#[derive(Debug, Deserialize)]
struct ProviderMetadata {
	issuer: String,
	jwks_uri: Url,
}

/// Verifies ID tokens against an issuer's published keys.
#[derive(Clone, Debug)]
pub struct OidcVerifier {
	issuer: String,
	client_id: String,
	keys: JwkSet,
}
impl OidcVerifier {
	/// Fetches `<issuer>/.well-known/openid-configuration`, then its `jwks_uri`.
	pub async fn discover(http: &ReqwestClient, issuer: &Url, client_id: &str) -> Result<Self> {
		let discovery = Url::parse(&format!(
			"{}/{DISCOVERY_PATH}",
			issuer.as_str().trim_end_matches('/')
		))
		.map_err(|e| TokenError::Discovery { message: e.to_string() })?;
		let metadata: ProviderMetadata = fetch_json(http, discovery).await?;

		if metadata.issuer.trim_end_matches('/') != issuer.as_str().trim_end_matches('/') {
			return Err(TokenError::Discovery {
				message: format!("issuer mismatch: expected {issuer}, got {}", metadata.issuer),
			}
			.into());
		}

		let keys: JwkSet = fetch_json(http, metadata.jwks_uri).await?;

		tracing::debug!(
			issuer = %metadata.issuer,
			keys = keys.keys.len(),
			"Discovered OpenID provider."
		);

		Ok(Self { issuer: metadata.issuer, client_id: client_id.to_owned(), keys })
	}

	/// Checks signature, issuer, audience, and expiry, returning the claims.
	pub fn verify(&self, id_token: &str) -> Result<IdTokenClaims> {
		let header = jsonwebtoken::decode_header(id_token).map_err(TokenError::IdToken)?;
		let jwk = match header.kid.as_deref() {
			Some(kid) => self.keys.find(kid),
			None => self.keys.keys.first(),
		}
		.ok_or_else(|| TokenError::Discovery {
			message: format!("no key matches kid {}", header.kid.as_deref().unwrap_or("<none>")),
		})?;
		let key = DecodingKey::from_jwk(jwk).map_err(TokenError::IdToken)?;
		let mut validation = Validation::new(header.alg);

		validation.set_audience(&[self.client_id.as_str()]);
		validation.set_issuer(&[self.issuer.as_str()]);

		let data = jsonwebtoken::decode::<IdTokenClaims>(id_token, &key, &validation)
			.map_err(TokenError::IdToken)?;

		Ok(data.claims)
	}
}

/// Decodes the claims of an ID token without checking its signature.
pub fn decode_unverified(id_token: &str) -> Result<IdTokenClaims> {
	let malformed = || TokenError::Discovery { message: "ID token is not a JWT".into() };
	let payload = id_token.split('.').nth(1).ok_or_else(malformed)?;
	let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).map_err(|_| malformed())?;

	serde_json::from_slice(&bytes).map_err(|_| malformed().into())
}

async fn fetch_json<T>(http: &ReqwestClient, url: Url) -> Result<T>
where
	T: serde::de::DeserializeOwned,
{
	let discovery_error = |e: ReqwestError| TokenError::Discovery { message: e.to_string() };

	Ok(http
		.get(url)
		.send()
		.await
		.and_then(|response| response.error_for_status())
		.map_err(discovery_error)?
		.json::<T>()
		.await
		.map_err(discovery_error)?)
}
