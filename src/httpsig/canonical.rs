//! Canonical signing string construction.

// std
use std::net::Ipv6Addr;
// crates.io
use axum::http::{HeaderMap, Method, Uri, header::HOST};
// self
use crate::{_prelude::*, httpsig::SignatureError};

/// Pseudo-header covering the lowercase method and path-and-query.
pub const REQUEST_TARGET: &str = "(request-target)";

/// Builds the newline-joined `name: value` string covering `names`, in order.
pub fn signing_string(
	method: &Method,
	uri: &Uri,
	headers: &HeaderMap,
	names: &[String],
) -> Result<String, SignatureError> {
	let mut lines = Vec::with_capacity(names.len());

	for name in names {
		let name = name.to_ascii_lowercase();
		let value = match name.as_str() {
			REQUEST_TARGET => request_target(method, uri),
			"host" => clean_host(&raw_host(uri, headers)?)?,
			_ => header_value(headers, &name)?,
		};

		lines.push(format!("{name}: {value}"));
	}

	Ok(lines.join("\n"))
}

/// Normalizes a host for signing.
///
/// Slashes and spaces are dropped, internationalized names are converted to ASCII, and IPv6
/// zone identifiers are removed. Ports are kept.
pub fn clean_host(raw: &str) -> Result<String, SignatureError> {
	let stripped = raw.chars().filter(|c| *c != '/' && *c != ' ').collect::<String>();
	let invalid = || SignatureError::InvalidHost(raw.to_owned());

	if stripped.is_empty() {
		return Err(invalid());
	}
	if let Some(bracketed) = stripped.strip_prefix('[') {
		let (address, port) = bracketed.split_once(']').ok_or_else(invalid)?;
		let address = address.split('%').next().unwrap_or_default();

		address.parse::<Ipv6Addr>().map_err(|_| invalid())?;

		return Ok(format!("[{address}]{port}"));
	}

	let (name, port) = match stripped.rsplit_once(':') {
		Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => (name, Some(port)),
		_ => (stripped.as_str(), None),
	};
	let ascii = idna::domain_to_ascii(name).map_err(|_| invalid())?;

	Ok(match port {
		Some(port) => format!("{ascii}:{port}"),
		None => ascii,
	})
}

fn request_target(method: &Method, uri: &Uri) -> String {
	let path = uri.path_and_query().map(|value| value.as_str()).unwrap_or("/");

	format!("{} {path}", method.as_str().to_ascii_lowercase())
}

fn raw_host(uri: &Uri, headers: &HeaderMap) -> Result<String, SignatureError> {
	if let Some(value) = headers.get(HOST) {
		return value
			.to_str()
			.map(str::to_owned)
			.map_err(|_| SignatureError::InvalidHeaderValue("host".into()));
	}

	uri.authority()
		.map(|authority| authority.as_str().to_owned())
		.ok_or_else(|| SignatureError::MissingHeader("host".into()))
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<String, SignatureError> {
	let mut values = Vec::new();

	for value in headers.get_all(name) {
		let value =
			value.to_str().map_err(|_| SignatureError::InvalidHeaderValue(name.to_owned()))?;

		values.push(value.trim().replace(['\r', '\n'], " "));
	}

	if values.is_empty() {
		return Err(SignatureError::MissingHeader(name.to_owned()));
	}

	Ok(values.join(", "))
}
