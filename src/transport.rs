//! Service transports.
//!
//! [`Transport`] covers the three operations both wire encodings share. The RPC client also
//! implements [`StreamTransport`]; the JSON client adds [`JsonTransport::graphql`]. Each call
//! takes a [`CallContext`] that carries per-call options in and response metadata out.

pub mod json;
pub mod rpc;

pub use json::*;
pub use rpc::*;

// crates.io
use futures_util::Stream;
// self
use crate::{
	_prelude::*,
	auth::TokenSource,
	http::{ResponseMetadata, ResponseMetadataSlot},
	model::{QueryReply, QueryRequest, QueryResult, SuggestRequest},
};

/// Future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Lazily produced sequence of streamed results.
pub type ResultStream = Pin<Box<dyn Stream<Item = Result<QueryResult>> + Send>>;

/// Query, result, and suggest operations shared by both transports.
pub trait Transport
where
	Self: Send + Sync,
{
	/// Submits URLs and/or content.
	fn query<'a>(
		&'a self,
		ctx: &'a CallContext,
		request: &'a QueryRequest,
	) -> TransportFuture<'a, QueryReply>;

	/// Fetches the current result for one request ID.
	fn result<'a>(
		&'a self,
		ctx: &'a CallContext,
		request_id: &'a str,
	) -> TransportFuture<'a, QueryResult>;

	/// Submits a categorization suggestion.
	fn suggest<'a>(
		&'a self,
		ctx: &'a CallContext,
		request: &'a SuggestRequest,
	) -> TransportFuture<'a, ()>;
}

/// Server-streamed results.
pub trait StreamTransport: Transport {
	/// Opens the result stream.
	fn stream<'a>(&'a self, ctx: &'a CallContext) -> TransportFuture<'a, ResultStream>;
}

/// Per-call options and the metadata the call reports back.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
	/// Send a fresh tracing tag with the call.
	pub trace: bool,
	/// Hints forwarded to mock services; real services ignore them.
	pub mock_hints: Vec<(String, String)>,
	/// Receives the response metadata.
	pub metadata: ResponseMetadataSlot,
}
impl CallContext {
	/// Enables the client tracing tag.
	pub fn with_trace(mut self, trace: bool) -> Self {
		self.trace = trace;

		self
	}

	/// Sets mock hints.
	pub fn with_mock_hints(mut self, hints: Vec<(String, String)>) -> Self {
		self.mock_hints = hints;

		self
	}

	/// Context for a follow-up call: same options, empty metadata slot.
	pub fn fork(&self) -> Self {
		Self {
			trace: self.trace,
			mock_hints: self.mock_hints.clone(),
			metadata: ResponseMetadataSlot::default(),
		}
	}

	/// Generates the tracing tag to send, when enabled.
	pub fn client_trace_tag(&self) -> Option<String> {
		self.trace.then(|| ulid::Ulid::new().to_string())
	}

	/// Service trace ID of the last response.
	pub fn trace_id(&self) -> Option<String> {
		self.metadata.peek().and_then(|meta| meta.trace_id)
	}

	pub(crate) fn record(&self, meta: ResponseMetadata) {
		self.metadata.store(meta);
	}
}

/// Returns the `Authorization` header value, or `None` when credentials are disabled.
pub(crate) async fn authorization(
	source: Option<&Arc<dyn TokenSource>>,
) -> Result<Option<String>> {
	match source {
		Some(source) => Ok(Some(source.token().await?.token.authorization())),
		None => Ok(None),
	}
}


/// Adds `scheme` to a target that has none.
pub(crate) fn with_scheme(target: &str, secure: bool) -> String {
	if target.contains("://") {
		target.to_owned()
	} else {
		format!("{}://{target}", if secure { "https" } else { "http" })
	}
}
