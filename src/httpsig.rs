//! HTTP message signatures (draft-cavage style) for callback requests.
//!
//! The service signs every callback it posts. [`Verifier`] checks the `Signature` (or
//! `Authorization: Signature`) header against keys resolved by a [`KeyGetter`], and re-computes
//! the body digest whenever the `digest` header is part of the signed set. [`Signer`] produces
//! the same headers and is used by tests and local tooling.

pub mod algorithm;
pub mod canonical;
pub mod digest;
pub mod key;
pub mod params;

pub use algorithm::*;
pub use canonical::*;
pub use digest::*;
pub use key::*;
pub use params::*;

// crates.io
use axum::http::{HeaderMap, HeaderValue, Method, Uri, header::AUTHORIZATION};
// self
use crate::{_prelude::*, error::BoxError};

/// Signature parse, key, digest, and verification failures.
#[derive(Debug, ThisError)]
pub enum SignatureError {
	/// Request carries neither a `Signature` nor an `Authorization: Signature` header.
	#[error("Request carries no signature.")]
	Missing,
	/// Signature parameters cannot be parsed.
	#[error("Signature parameters are malformed: {reason}.")]
	Malformed {
		/// What was wrong.
		reason: String,
	},
	/// Signature algorithm is not recognized.
	#[error("Unsupported signature algorithm `{0}`.")]
	UnsupportedAlgorithm(String),
	/// No digest algorithm in the header is supported.
	#[error("Unsupported digest algorithm `{0}`.")]
	UnsupportedDigest(String),
	/// A header listed in `headers=` is absent.
	#[error("Signed header `{0}` is missing from the request.")]
	MissingHeader(String),
	/// A signed header value is not visible ASCII.
	#[error("Header `{0}` is not valid text.")]
	InvalidHeaderValue(String),
	/// The host cannot be normalized.
	#[error("Host `{0}` is invalid.")]
	InvalidHost(String),
	/// The recomputed body digest differs from the header.
	#[error("Body digest does not match the Digest header.")]
	DigestMismatch,
	/// The signature does not verify.
	#[error("Signature does not match.")]
	Mismatch,
	/// The key set could not be fetched.
	#[error("Key `{key_id}` could not be retrieved.")]
	KeyFetch {
		/// Key identifier (URL).
		key_id: String,
		/// Underlying failure.
		#[source]
		source: BoxError,
	},
	/// The key set holds no public signature key.
	#[error("No usable verification key in set `{0}`.")]
	NoUsableKey(String),
	/// Key material cannot be decoded.
	#[error("Key is invalid: {0}.")]
	InvalidKey(String),
	/// Key type does not fit the algorithm.
	#[error("Key type does not match algorithm `{0}`.")]
	KeyMismatch(&'static str),
	/// The signing primitive failed.
	#[error("Signing failed: {0}.")]
	Signing(String),
}
impl SignatureError {
	pub(crate) fn malformed(reason: impl Into<String>) -> Self {
		Self::Malformed { reason: reason.into() }
	}

	pub(crate) fn key_fetch(
		key_id: &str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::KeyFetch { key_id: key_id.to_owned(), source: Box::new(src) }
	}
}

/// Headers never signed unless explicitly listed.
pub const DEFAULT_EXCLUDED_HEADERS: [&str; 5] =
	["host", "user-agent", "content-length", "transfer-encoding", "trailer"];

/// Produces signature headers for outgoing requests.
#[derive(Debug)]
pub struct Signer {
	key_id: String,
	algorithm: Algorithm,
	key: SigningKey,
	headers: Option<Vec<String>>,
	placement: SignaturePlacement,
}
impl Signer {
	/// Creates a signer that places its output in the `Signature` header.
	pub fn new(key_id: impl Into<String>, algorithm: Algorithm, key: SigningKey) -> Self {
		Self {
			key_id: key_id.into(),
			algorithm,
			key,
			headers: None,
			placement: SignaturePlacement::Signature,
		}
	}

	/// Signs exactly `headers`, in order.
	pub fn with_headers<I, S>(mut self, headers: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.headers =
			Some(headers.into_iter().map(|name| name.into().to_ascii_lowercase()).collect());

		self
	}

	/// Chooses the header that carries the signature.
	pub fn with_placement(mut self, placement: SignaturePlacement) -> Self {
		self.placement = placement;

		self
	}

	/// Computes the signature over `headers` and inserts the signature header.
	pub fn sign(
		&self,
		method: &Method,
		uri: &Uri,
		headers: &mut HeaderMap,
	) -> Result<(), SignatureError> {
		let names = match &self.headers {
			Some(names) => names.clone(),
			None => default_signed_headers(headers),
		};
		let signing_string = canonical::signing_string(method, uri, headers, &names)?;
		let signature = self.algorithm.sign(&self.key, signing_string.as_bytes())?;
		let params = SignatureParams {
			key_id: self.key_id.clone(),
			algorithm: self.algorithm,
			headers: names,
			signature,
		};
		let value = match self.placement {
			SignaturePlacement::Signature => params.to_header_value(),
			SignaturePlacement::Authorization => format!("Signature {}", params.to_header_value()),
		};
		let value = HeaderValue::from_str(&value)
			.map_err(|_| SignatureError::InvalidHeaderValue(self.placement.header_name().into()))?;

		match self.placement {
			SignaturePlacement::Signature => headers.insert(SIGNATURE_HEADER, value),
			SignaturePlacement::Authorization => headers.insert(AUTHORIZATION, value),
		};

		Ok(())
	}
}

/// Verifies signatures on inbound requests.
#[derive(Clone)]
pub struct Verifier {
	getter: Arc<dyn KeyGetter>,
}
impl Verifier {
	/// Creates a verifier resolving keys through `getter`.
	pub fn new(getter: Arc<dyn KeyGetter>) -> Self {
		Self { getter }
	}

	/// Verifies the request; `body` is the exact payload received.
	pub async fn verify(
		&self,
		method: &Method,
		uri: &Uri,
		headers: &HeaderMap,
		body: &[u8],
	) -> Result<(), SignatureError> {
		let (_, raw) = params::locate(headers).ok_or(SignatureError::Missing)?;
		let params = SignatureParams::parse(raw)?;

		if params.headers.iter().any(|name| name == DIGEST_HEADER) {
			let value = headers
				.get(DIGEST_HEADER)
				.ok_or_else(|| SignatureError::MissingHeader(DIGEST_HEADER.into()))?
				.to_str()
				.map_err(|_| SignatureError::InvalidHeaderValue(DIGEST_HEADER.into()))?;

			digest::verify_header(value, body)?;
		}

		let signing_string = canonical::signing_string(method, uri, headers, &params.headers)?;
		let key = self.getter.get(&params.key_id, params.algorithm).await?;

		params.algorithm.verify(&key, signing_string.as_bytes(), &params.signature)
	}
}
impl Debug for Verifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Verifier(..)")
	}
}

fn default_signed_headers(headers: &HeaderMap) -> Vec<String> {
	let mut names = vec![canonical::REQUEST_TARGET.to_owned(), "host".to_owned()];

	for name in headers.keys() {
		let name = name.as_str();

		if DEFAULT_EXCLUDED_HEADERS.contains(&name) || names.iter().any(|known| known == name) {
			continue;
		}

		names.push(name.to_owned());
	}

	names
}
