//! Client-level error types shared across transports, token sources, and the engine.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Invalid user input (URLs, content, datasets, categories).
	#[error(transparent)]
	Input(#[from] InputError),
	/// Transport failure (DNS, TCP, TLS, HTTP status, RPC status).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// OAuth 2.0 exchange or token cache failure.
	#[error(transparent)]
	Token(#[from] TokenError),
	/// HTTP signature parse, key fetch, digest, or verification failure.
	#[error(transparent)]
	Signature(#[from] crate::httpsig::SignatureError),

	/// Status reported by the service for a single request.
	#[error("Service reported error {code}: {message}.")]
	Service {
		/// Numeric status code.
		code: i32,
		/// Service-supplied message.
		message: String,
	},
	/// Outstanding requests did not complete before the deadline.
	#[error("Timed out waiting for results.")]
	Timeout,
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured URL cannot be parsed.
	#[error("Configured {field} URL `{value}` is invalid.")]
	InvalidUrl {
		/// Flag or field the URL came from.
		field: &'static str,
		/// Raw value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A header value cannot be encoded for the wire.
	#[error("Header `{name}` carries a value that cannot be sent.")]
	InvalidHeader {
		/// Header name.
		name: &'static str,
	},
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// More than one credential mode was requested.
	#[error("Credential options {first} and {second} cannot be combined.")]
	ConflictingCredentials {
		/// First conflicting flag.
		first: &'static str,
		/// Second conflicting flag.
		second: &'static str,
	},
	/// No credential mode was configured.
	#[error(
		"No credentials configured; pass --client-id and --client-secret, --access-token, \
		 --use-user-credentials, or --mock-no-credentials."
	)]
	MissingCredentials,
	/// Client credentials were requested without a secret.
	#[error("The client-credentials flow requires --client-secret.")]
	MissingClientSecret,
	/// No data directory could be derived from the environment.
	#[error("Unable to determine a data directory; pass --data-dir.")]
	MissingDataDir,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Invalid user input detected before any network call.
#[derive(Debug, ThisError)]
pub enum InputError {
	/// Neither URLs nor content were supplied.
	#[error("At least one URL or content is required.")]
	NoTargets,
	/// No dataset kind was requested.
	#[error("At least one dataset is required.")]
	NoDatasets,
	/// No request IDs were supplied to a command that needs them.
	#[error("At least one request ID is required.")]
	NoRequestIds,
	/// A `--content` value was empty.
	#[error("Content must not be empty.")]
	EmptyContent,
	/// A `--content` value was a bare `@`.
	#[error("Content `@` must name a file or `-` for stdin.")]
	BareContentReference,
	/// A content file could not be read.
	#[error("Unable to read content from {path}.")]
	ReadContent {
		/// File path, or `-` for stdin.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// A URL cannot be parsed after normalization.
	#[error("URL `{value}` is invalid.")]
	InvalidUrl {
		/// Raw value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Dataset name is not recognized.
	#[error("Unknown dataset `{value}`.")]
	UnknownDataset {
		/// Raw value.
		value: String,
	},
	/// Category name is not recognized.
	#[error("Unknown category `{value}`.")]
	UnknownCategory {
		/// Raw value.
		value: String,
	},
	/// Duration string is malformed.
	#[error("Invalid duration `{value}`; expected forms like `100ms`, `15s`, or `1m`.")]
	InvalidDuration {
		/// Raw value.
		value: String,
	},
	/// Suggestion carries no dataset values.
	#[error("A suggestion requires at least one category or a malicious verdict.")]
	EmptySuggestion,
}

/// Transport-level failures (network, IO, HTTP status, RPC status).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying client reported a network failure.
	#[error("Network error occurred while calling the service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// JSON endpoint returned a non-2xx status.
	#[error("http error: {reason} ({status})")]
	Http {
		/// HTTP status code.
		status: u16,
		/// Canonical reason phrase.
		reason: String,
	},
	/// RPC call ended with a non-OK status.
	#[error("rpc error: code = {:?} desc = {}", .0.code(), .0.message())]
	Rpc(Box<tonic::Status>),
	/// Response payload could not be decoded.
	#[error("Service returned a malformed response.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the service.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns the HTTP status carried by the error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Http { status, .. } => Some(*status),
			_ => None,
		}
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
impl From<tonic::Status> for TransportError {
	fn from(e: tonic::Status) -> Self {
		Self::Rpc(Box::new(e))
	}
}
impl From<tonic::transport::Error> for TransportError {
	fn from(e: tonic::transport::Error) -> Self {
		Self::network(e)
	}
}

/// OAuth 2.0 exchange, ID-token, and cache failures.
#[derive(Debug, ThisError)]
pub enum TokenError {
	/// Token endpoint returned an unexpected response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Provider- or client-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Provider rejected the grant (bad code, refresh token, or client).
	#[error("Authorization server rejected the {grant} grant: {reason}.")]
	Rejected {
		/// Grant label.
		grant: &'static str,
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Authorization callback carried a mismatched `state`.
	#[error("Authorization callback state does not match the pending request.")]
	StateMismatch,
	/// Authorization server redirected back with an error.
	#[error("Authorization was denied: {reason}.")]
	AuthorizationDenied {
		/// Provider-supplied error code and description.
		reason: String,
	},
	/// Authorization callback omitted the code.
	#[error("Authorization callback is missing the code parameter.")]
	MissingCode,
	/// Local listener for the authorization callback failed.
	#[error("Authorization callback listener failed.")]
	Listener(#[source] std::io::Error),
	/// The listener stopped before an authorization code arrived.
	#[error("Authorization callback listener stopped before a code arrived.")]
	ListenerClosed,
	/// Token response omitted the ID token the caller asked for.
	#[error("Token response does not include an ID token.")]
	MissingIdToken,
	/// Issuer discovery or key retrieval failed.
	#[error("OpenID Connect discovery failed: {message}.")]
	Discovery {
		/// Failure summary.
		message: String,
	},
	/// ID token failed verification.
	#[error("ID token is invalid.")]
	IdToken(#[source] jsonwebtoken::errors::Error),
}
