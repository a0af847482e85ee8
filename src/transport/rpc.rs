//! gRPC transport over a single lazily dialed channel.

pub mod pb;

// crates.io
use tokio::sync::OnceCell;
use tonic::{
	Streaming,
	client::Grpc,
	codec::ProstCodec,
	codegen::http::uri::PathAndQuery,
	metadata::{AsciiMetadataKey, AsciiMetadataValue, MetadataMap},
	transport::{Channel, ClientTlsConfig, Endpoint},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSource,
	error::{ConfigError, TransportError},
	http::{CLIENT_TRACE_HEADER, ResponseMetadata, SERVICE_TRACE_HEADER},
	model::{QueryReply, QueryRequest, QueryResult, SuggestRequest},
	obs::{self, CallKind},
	transport::{self, CallContext, ResultStream, StreamTransport, Transport, TransportFuture},
};

/// Default gRPC target.
pub const DEFAULT_GRPC_TARGET: &str = "api.zvelo.com:443";

const QUERY_PATH: &str = "/zvelo.msg.API/Query";
const RESULT_PATH: &str = "/zvelo.msg.API/Result";
const SUGGEST_PATH: &str = "/zvelo.msg.API/Suggest";
const STREAM_PATH: &str = "/zvelo.msg.API/Stream";

/// Client for the `zvelo.msg.API` service.
///
/// The channel is dialed on first use and shared by clones for the rest of the invocation.
#[derive(Clone)]
pub struct RpcTransport {
	endpoint: Endpoint,
	channel: Arc<OnceCell<Channel>>,
	tokens: Option<Arc<dyn TokenSource>>,
}
impl RpcTransport {
	/// Prepares a client for `target`; a missing scheme becomes `https://` or `http://`.
	pub fn new(target: &str, tls: bool, insecure_skip_verify: bool) -> Result<Self, ConfigError> {
		let uri = transport::with_scheme(target.trim(), tls);
		let mut endpoint = Endpoint::from_shared(uri).map_err(ConfigError::http_client_build)?;

		if tls {
			if insecure_skip_verify {
				tracing::warn!("The RPC transport cannot skip TLS verification; verifying anyway.");
			}

			endpoint = endpoint
				.tls_config(ClientTlsConfig::new().with_webpki_roots())
				.map_err(ConfigError::http_client_build)?;
		}

		Ok(Self { endpoint, channel: Arc::new(OnceCell::new()), tokens: None })
	}

	/// Attaches the token source used for `authorization` metadata.
	pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
		self.tokens = Some(tokens);

		self
	}

	async fn grpc(&self) -> Result<Grpc<Channel>> {
		let channel = self
			.channel
			.get_or_try_init(|| async {
				tracing::debug!(target = %self.endpoint.uri(), "Dialing RPC channel.");

				self.endpoint.connect().await
			})
			.await
			.map_err(TransportError::from)?
			.clone();
		let mut grpc = Grpc::new(channel);

		grpc.ready().await.map_err(TransportError::from)?;

		Ok(grpc)
	}

	async fn request<T>(&self, ctx: &CallContext, message: T) -> Result<tonic::Request<T>> {
		let mut request = tonic::Request::new(message);
		let metadata = request.metadata_mut();

		if let Some(value) = transport::authorization(self.tokens.as_ref()).await? {
			let value = value
				.parse::<AsciiMetadataValue>()
				.map_err(|_| ConfigError::InvalidHeader { name: "authorization" })?;

			metadata.insert("authorization", value);
		}
		if let Some(tag) = ctx.client_trace_tag() {
			let value = tag
				.parse::<AsciiMetadataValue>()
				.map_err(|_| ConfigError::InvalidHeader { name: CLIENT_TRACE_HEADER })?;

			metadata.insert(CLIENT_TRACE_HEADER, value);
		}

		for (name, value) in &ctx.mock_hints {
			let key = format!("mock-{}", name.trim_start_matches("mock_").replace('_', "-"));

			let key = AsciiMetadataKey::from_bytes(key.as_bytes());

			match (key, value.parse::<AsciiMetadataValue>()) {
				(Ok(key), Ok(value)) => {
					metadata.insert(key, value);
				},
				_ => tracing::warn!(hint = %name, "Skipping mock hint that cannot be sent."),
			}
		}

		Ok(request)
	}

	async fn unary<Req, Resp>(
		&self,
		ctx: &CallContext,
		path: &'static str,
		message: Req,
	) -> Result<Resp>
	where
		Req: 'static + prost::Message + Send + Sync,
		Resp: 'static + prost::Message + Default + Send + Sync,
	{
		let mut grpc = self.grpc().await?;
		let request = self.request(ctx, message).await?;
		let codec = ProstCodec::<Req, Resp>::default();

		match grpc.unary(request, PathAndQuery::from_static(path), codec).await {
			Ok(response) => {
				ctx.record(metadata_of(response.metadata()));

				Ok(response.into_inner())
			},
			Err(status) => {
				ctx.record(metadata_of(status.metadata()));

				Err(TransportError::from(status).into())
			},
		}
	}

	async fn open_stream(&self, ctx: &CallContext) -> Result<Streaming<pb::QueryResult>> {
		let mut grpc = self.grpc().await?;
		let request = self.request(ctx, pb::Empty {}).await?;
		let codec = ProstCodec::<pb::Empty, pb::QueryResult>::default();
		let response = grpc
			.server_streaming(request, PathAndQuery::from_static(STREAM_PATH), codec)
			.await
			.map_err(TransportError::from)?;

		ctx.record(metadata_of(response.metadata()));

		Ok(response.into_inner())
	}
}
impl Transport for RpcTransport {
	fn query<'a>(
		&'a self,
		ctx: &'a CallContext,
		request: &'a QueryRequest,
	) -> TransportFuture<'a, QueryReply> {
		Box::pin(obs::observe(CallKind::Query, "rpc", async move {
			let replies: pb::QueryReplies =
				self.unary(ctx, QUERY_PATH, pb::QueryRequests::from(request)).await?;

			Ok(replies.into())
		}))
	}

	fn result<'a>(
		&'a self,
		ctx: &'a CallContext,
		request_id: &'a str,
	) -> TransportFuture<'a, QueryResult> {
		Box::pin(obs::observe(CallKind::Result, "rpc", async move {
			let message = pb::RequestId { request_id: request_id.to_owned() };
			let result: pb::QueryResult = self.unary(ctx, RESULT_PATH, message).await?;

			Ok(result.into())
		}))
	}

	fn suggest<'a>(
		&'a self,
		ctx: &'a CallContext,
		request: &'a SuggestRequest,
	) -> TransportFuture<'a, ()> {
		Box::pin(obs::observe(CallKind::Suggest, "rpc", async move {
			let _: pb::Empty = self.unary(ctx, SUGGEST_PATH, pb::Suggestion::from(request)).await?;

			Ok(())
		}))
	}
}
impl StreamTransport for RpcTransport {
	fn stream<'a>(&'a self, ctx: &'a CallContext) -> TransportFuture<'a, ResultStream> {
		Box::pin(obs::observe(CallKind::Stream, "rpc", async move {
			let first = self.open_stream(ctx).await?;
			let state = StreamState {
				transport: self.clone(),
				ctx: ctx.fork(),
				current: Some(first),
				redialed: false,
			};
			let stream: ResultStream =
				Box::pin(futures_util::stream::unfold(Some(state), next_streamed));

			Ok(stream)
		}))
	}
}
impl Debug for RpcTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RpcTransport")
			.field("target", &self.endpoint.uri())
			.field("connected", &self.channel.initialized())
			.field("authenticated", &self.tokens.is_some())
			.finish()
	}
}

struct StreamState {
	transport: RpcTransport,
	ctx: CallContext,
	current: Option<Streaming<pb::QueryResult>>,
	redialed: bool,
}

async fn next_streamed(
	state: Option<StreamState>,
) -> Option<(Result<QueryResult>, Option<StreamState>)> {
	let mut state = state?;

	loop {
		if state.current.is_none() {
			match state.transport.open_stream(&state.ctx).await {
				Ok(stream) => state.current = Some(stream),
				Err(e) => return Some((Err(e), None)),
			}
		}

		let stream = state.current.as_mut()?;

		match stream.message().await {
			Ok(Some(message)) => return Some((Ok(message.into()), Some(state))),
			Ok(None) if !state.redialed => {
				tracing::debug!("Result stream ended; redialing once.");

				state.redialed = true;
				state.current = None;
			},
			Ok(None) => return None,
			Err(status) => return Some((Err(TransportError::from(status).into()), None)),
		}
	}
}

fn metadata_of(metadata: &MetadataMap) -> ResponseMetadata {
	ResponseMetadata {
		trace_id: metadata
			.get(SERVICE_TRACE_HEADER)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned),
		..Default::default()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::StaticTokenSource;

	#[test]
	fn targets_gain_scheme() {
		let plain = RpcTransport::new("localhost:9000", false, false)
			.expect("Plain target should be accepted.");

		assert_eq!(plain.endpoint.uri().to_string(), "http://localhost:9000/");
	}

	#[tokio::test]
	async fn request_carries_credentials_trace_and_hints() {
		let transport = RpcTransport::new("localhost:9000", false, false)
			.expect("Plain target should be accepted.")
			.with_token_source(Arc::new(StaticTokenSource::new("abc")));
		let ctx = CallContext::default()
			.with_trace(true)
			.with_mock_hints(vec![("mock_fetch_code".into(), "301".into())]);
		let request = transport
			.request(&ctx, pb::Empty {})
			.await
			.expect("Request metadata should build.");
		let metadata = request.metadata();

		assert_eq!(
			metadata.get("authorization").and_then(|value| value.to_str().ok()),
			Some("Bearer abc")
		);
		assert!(metadata.get(CLIENT_TRACE_HEADER).is_some());
		assert_eq!(
			metadata.get("mock-fetch-code").and_then(|value| value.to_str().ok()),
			Some("301")
		);
	}

	#[test]
	fn trace_id_is_read_from_metadata() {
		let mut metadata = MetadataMap::new();

		metadata.insert(SERVICE_TRACE_HEADER, AsciiMetadataValue::from_static("abc:def:0:1"));

		assert_eq!(metadata_of(&metadata).trace_id.as_deref(), Some("abc:def:0:1"));
	}
}
