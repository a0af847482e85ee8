//! HTTP primitives shared by the JSON transport, token exchanges, and key fetches.
//!
//! [`ResponseMetadata`] and [`ResponseMetadataSlot`] carry what a call learned from the wire
//! (status, `Retry-After`, the service's `uber-trace-id`) back to the caller after the response
//! body has been consumed. Callers create a fresh slot for each call via
//! [`CallContext`](crate::transport::CallContext) and read it once the call resolves.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use reqwest::{
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError};

/// Response header carrying the service-side trace identifier.
pub const SERVICE_TRACE_HEADER: &str = "uber-trace-id";
/// Request header carrying the client-generated tracing tag.
pub const CLIENT_TRACE_HEADER: &str = "x-client-trace-id";

/// Captures metadata from the most recent response.
///
/// Additional metadata fields may be added in future releases, so downstream code
/// should construct values using field names instead of struct update syntax.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Service trace identifier (`uber-trace-id`), when returned.
	pub trace_id: Option<String>,
}
impl ResponseMetadata {
	/// Extracts metadata from an HTTP status and header map.
	pub fn from_headers(status: u16, headers: &HeaderMap) -> Self {
		Self {
			status: Some(status),
			retry_after: parse_retry_after(headers),
			trace_id: headers
				.get(SERVICE_TRACE_HEADER)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned),
		}
	}
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and caller.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}

	/// Returns a copy of the captured metadata without clearing it.
	pub fn peek(&self) -> Option<ResponseMetadata> {
		self.0.lock().clone()
	}
}

/// Options used to build the shared [`ReqwestHttpClient`].
#[derive(Clone, Debug, Default)]
pub struct HttpClientOptions {
	/// Accept any server certificate.
	pub insecure_skip_verify: bool,
	/// Per-request timeout.
	pub timeout: Option<std::time::Duration>,
}
impl HttpClientOptions {
	/// Toggles certificate verification.
	pub fn with_insecure_skip_verify(mut self, insecure: bool) -> Self {
		self.insecure_skip_verify = insecure;

		self
	}

	/// Sets the per-request timeout.
	pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The client never follows redirects: token endpoints return results directly, and the JSON
/// transport reports a 3xx as an HTTP error instead of silently replaying a POST.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client from the provided options.
	pub fn build(options: &HttpClientOptions) -> Result<Self, ConfigError> {
		let mut builder = ReqwestClient::builder()
			.redirect(Policy::none())
			.user_agent(concat!("zvelo-client/", env!("CARGO_PKG_VERSION")));

		if options.insecure_skip_verify {
			builder = builder.danger_accept_invalid_certs(true);
		}
		if let Some(timeout) = options.timeout {
			builder = builder.timeout(timeout);
		}

		Ok(Self(builder.build()?))
	}

	/// Builds an instrumented handle that captures response metadata for `oauth2`.
	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl Debug for ReqwestHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestHttpClient(..)")
	}
}

struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Adapter that implements [`AsyncHttpClient`] for reqwest while recording metadata.
#[derive(Clone)]
pub(crate) struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			client.slot.store(ResponseMetadata::from_headers(status.as_u16(), &headers));

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).ok()?));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
