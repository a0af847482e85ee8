//! Signature header parameters: `keyId="..",algorithm="..",headers="..",signature=".."`.

// crates.io
use axum::http::{HeaderMap, header::AUTHORIZATION};
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD},
};
// self
use crate::{
	_prelude::*,
	httpsig::{Algorithm, SignatureError},
};

/// Name of the dedicated signature header.
pub const SIGNATURE_HEADER: &str = "signature";
/// Headers signed when `headers=` is omitted.
pub const DEFAULT_HEADERS: &str = "date";

const AUTHORIZATION_SCHEME: &str = "Signature ";

/// Header that carried (or should carry) the signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignaturePlacement {
	/// `Signature: keyId=...`.
	Signature,
	/// `Authorization: Signature keyId=...`.
	Authorization,
}
impl SignaturePlacement {
	/// Header name for this placement.
	pub const fn header_name(self) -> &'static str {
		match self {
			SignaturePlacement::Signature => SIGNATURE_HEADER,
			SignaturePlacement::Authorization => "authorization",
		}
	}
}

/// Parsed signature parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureParams {
	/// Key identifier; a URL for service-issued signatures.
	pub key_id: String,
	/// Signature algorithm.
	pub algorithm: Algorithm,
	/// Lowercased names of the signed headers, in signing order.
	pub headers: Vec<String>,
	/// Raw signature bytes.
	pub signature: Vec<u8>,
}
impl SignatureParams {
	/// Parses the header value (without the `Signature ` scheme prefix).
	pub fn parse(raw: &str) -> Result<Self, SignatureError> {
		let mut key_id = None;
		let mut algorithm = None;
		let mut headers = None;
		let mut signature = None;

		for (name, value) in split_params(raw)? {
			match name.to_ascii_lowercase().as_str() {
				"keyid" => key_id = Some(value),
				"algorithm" => algorithm = Some(value.parse::<Algorithm>()?),
				"headers" => headers = Some(value),
				"signature" => signature = Some(decode_signature(&value)?),
				_ => {},
			}
		}

		let key_id = key_id
			.filter(|value| !value.is_empty())
			.ok_or_else(|| SignatureError::malformed("missing keyId"))?;
		let algorithm = algorithm.ok_or_else(|| SignatureError::malformed("missing algorithm"))?;
		let signature = signature.ok_or_else(|| SignatureError::malformed("missing signature"))?;
		let headers = headers
			.as_deref()
			.unwrap_or(DEFAULT_HEADERS)
			.split_whitespace()
			.map(str::to_ascii_lowercase)
			.collect::<Vec<_>>();
		let headers =
			if headers.is_empty() { vec![DEFAULT_HEADERS.to_owned()] } else { headers };

		Ok(Self { key_id, algorithm, headers, signature })
	}

	/// Renders the parameters; the signature is base64url without padding.
	pub fn to_header_value(&self) -> String {
		format!(
			"keyId=\"{}\",algorithm=\"{}\",headers=\"{}\",signature=\"{}\"",
			self.key_id,
			self.algorithm,
			self.headers.join(" "),
			URL_SAFE_NO_PAD.encode(&self.signature)
		)
	}
}

/// Finds the signature header, preferring `Signature` over `Authorization`.
pub fn locate(headers: &HeaderMap) -> Option<(SignaturePlacement, &str)> {
	if let Some(value) = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok()) {
		return Some((SignaturePlacement::Signature, value));
	}

	let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
	let scheme = value.get(..AUTHORIZATION_SCHEME.len())?;

	if scheme.eq_ignore_ascii_case(AUTHORIZATION_SCHEME) {
		Some((SignaturePlacement::Authorization, value[AUTHORIZATION_SCHEME.len()..].trim_start()))
	} else {
		None
	}
}

fn split_params(raw: &str) -> Result<Vec<(String, String)>, SignatureError> {
	let mut params = Vec::new();
	let mut rest = raw.trim();

	while !rest.is_empty() {
		let (name, after) = rest
			.split_once('=')
			.ok_or_else(|| SignatureError::malformed(format!("expected `name=` in `{rest}`")))?;
		let after = after.trim_start();
		let (value, after) = if let Some(quoted) = after.strip_prefix('"') {
			let end = quoted
				.find('"')
				.ok_or_else(|| SignatureError::malformed("unterminated quoted value"))?;

			(&quoted[..end], &quoted[end + 1..])
		} else {
			let end = after.find(',').unwrap_or(after.len());

			(after[..end].trim_end(), &after[end..])
		};

		params.push((name.trim().to_owned(), value.to_owned()));

		let after = after.trim_start();

		rest = match after.strip_prefix(',') {
			Some(next) => next.trim_start(),
			None if after.is_empty() => after,
			None => return Err(SignatureError::malformed("expected `,` between parameters")),
		};
	}

	Ok(params)
}

fn decode_signature(value: &str) -> Result<Vec<u8>, SignatureError> {
	[URL_SAFE_NO_PAD, STANDARD, URL_SAFE, STANDARD_NO_PAD]
		.iter()
		.find_map(|engine| engine.decode(value).ok())
		.ok_or_else(|| SignatureError::malformed("signature is not base64"))
}
