// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::ScopeSet, error::TokenError};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;
const PKCE_METHOD: &str = "S256";

/// Authorization Code + PKCE handshake metadata for one browser round trip.
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Opaque state value that must round-trip via the redirect handler.
	pub state: String,
	/// Redirect URI supplied when constructing the authorize URL.
	pub redirect_uri: Url,
	/// Fully-formed authorize URL the user's browser is sent to.
	pub authorize_url: Url,
	pkce: PkcePair,
}
impl AuthorizationSession {
	/// Starts a session with fresh state and PKCE values.
	pub fn new(
		authorization_endpoint: &Url,
		client_id: &str,
		scope: &ScopeSet,
		redirect_uri: Url,
	) -> Self {
		let state = random_string(STATE_LEN);
		let pkce = PkcePair::generate();
		let authorize_url = build_authorize_url(
			authorization_endpoint,
			client_id,
			&redirect_uri,
			scope,
			&state,
			&pkce,
		);

		Self { state, redirect_uri, authorize_url, pkce }
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.pkce.challenge
	}

	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: Option<&str>) -> Result<(), TokenError> {
		if returned_state == Some(self.state.as_str()) {
			Ok(())
		} else {
			Err(TokenError::StateMismatch)
		}
	}

	pub(super) fn pkce_verifier(&self) -> &str {
		&self.pkce.verifier
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("code_challenge", &self.pkce.challenge)
			.finish()
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge }
	}
}

fn build_authorize_url(
	authorization_endpoint: &Url,
	client_id: &str,
	redirect_uri: &Url,
	scope: &ScopeSet,
	state: &str,
	pkce: &PkcePair,
) -> Url {
	let mut url = authorization_endpoint.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", client_id);
	pairs.append_pair("redirect_uri", redirect_uri.as_str());

	if !scope.is_empty() {
		pairs.append_pair("scope", scope.normalized());
	}

	pairs.append_pair("state", state);
	pairs.append_pair("code_challenge", &pkce.challenge);
	pairs.append_pair("code_challenge_method", PKCE_METHOD);

	drop(pairs);

	url
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn session() -> AuthorizationSession {
		AuthorizationSession::new(
			&Url::parse("https://auth.example.com/oauth2/auth").expect("Endpoint should parse."),
			"cli",
			&ScopeSet::new(["openid", "zvelo.dataset"]).expect("Scope fixture should be valid."),
			Url::parse("http://localhost:4445/callback").expect("Redirect should parse."),
		)
	}

	#[test]
	fn authorize_url_carries_state_and_pkce() {
		let session = session();
		let pairs: HashMap<String, String> =
			session.authorize_url.query_pairs().into_owned().collect();

		assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(pairs.get("client_id").map(String::as_str), Some("cli"));
		assert_eq!(pairs.get("scope").map(String::as_str), Some("openid zvelo.dataset"));
		assert_eq!(pairs.get("state"), Some(&session.state));
		assert_eq!(pairs.get("code_challenge").map(String::as_str), Some(session.code_challenge()));
		assert_eq!(pairs.get("code_challenge_method").map(String::as_str), Some("S256"));
		assert_eq!(session.code_challenge(), compute_pkce_challenge(session.pkce_verifier()));
	}

	#[test]
	fn state_validation_errors_on_mismatch() {
		let session = session();

		assert!(session.validate_state(Some(&session.state.clone())).is_ok());
		assert!(matches!(session.validate_state(Some("other")), Err(TokenError::StateMismatch)));
		assert!(matches!(session.validate_state(None), Err(TokenError::StateMismatch)));
	}
}
