//! Access token model, redacted secrets, and the cached token envelope.

// self
use crate::_prelude::*;

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// OAuth 2.0 access token with optional refresh token and expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	/// Access token secret.
	pub access_token: TokenSecret,
	/// Token type reported by the authorization server (usually `Bearer`).
	#[serde(default = "default_token_type")]
	pub token_type: String,
	/// Refresh token, when the server issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Absolute expiry; `None` never expires.
	#[serde(
		default,
		with = "time::serde::rfc3339::option",
		skip_serializing_if = "Option::is_none"
	)]
	pub expiry: Option<OffsetDateTime>,
}
impl Token {
	/// Tokens are treated as expired this long before their actual expiry.
	pub const EXPIRY_SKEW: Duration = Duration::seconds(10);

	/// Wraps a bare access token that never expires.
	pub fn bearer(access_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			token_type: default_token_type(),
			refresh_token: None,
			expiry: None,
		}
	}

	/// Sets an absolute expiry.
	pub fn with_expiry(mut self, expiry: OffsetDateTime) -> Self {
		self.expiry = Some(expiry);

		self
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(refresh_token));

		self
	}

	/// Returns true when the token can be used at `instant`.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		match self.expiry {
			Some(expiry) => instant < expiry - Self::EXPIRY_SKEW,
			None => true,
		}
	}

	/// Convenience helper that checks validity using the current UTC instant.
	pub fn is_valid(&self) -> bool {
		self.is_valid_at(OffsetDateTime::now_utc())
	}

	/// Renders the `Authorization` header value.
	pub fn authorization(&self) -> String {
		let kind = if self.token_type.is_empty() || self.token_type.eq_ignore_ascii_case("bearer")
		{
			"Bearer"
		} else {
			self.token_type.as_str()
		};

		format!("{kind} {}", self.access_token.expose())
	}
}

/// Token plus the optional ID token returned alongside it.
///
/// This is also the on-disk shape of the token cache: `{"token": {..}, "id_token": ".."}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
	/// Access token details.
	pub token: Token,
	/// Raw OpenID Connect ID token, when issued.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl IssuedToken {
	/// Wraps a token without an ID token.
	pub fn new(token: Token) -> Self {
		Self { token, id_token: None }
	}

	/// Attaches the raw ID token.
	pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
		self.id_token = Some(id_token.into());

		self
	}

	/// Returns true when the access token can be used now.
	pub fn is_valid(&self) -> bool {
		self.token.is_valid()
	}
}

fn default_token_type() -> String {
	"Bearer".into()
}
