//! JSON-over-HTTP transport.

// crates.io
use reqwest::{
	RequestBuilder, Response,
	header::{ACCEPT, AUTHORIZATION},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::TokenSource,
	error::{ConfigError, TransportError},
	http::{CLIENT_TRACE_HEADER, ReqwestHttpClient, ResponseMetadata},
	model::{GraphQlRequest, QueryReply, QueryRequest, QueryResult, SuggestRequest},
	obs::{self, CallKind},
	transport::{self, CallContext, Transport, TransportFuture},
};

/// Default REST base URL.
pub const DEFAULT_REST_BASE_URL: &str = "api.zvelo.com";

/// Observes every raw response before its body is consumed.
pub type ResponseHook = Arc<dyn Fn(&Response) + Send + Sync>;

/// Client for the service's JSON endpoints.
///
/// | Operation | Request |
/// |---|---|
/// | query | `POST /v1/query` |
/// | result | `GET /v1/query/{id}` |
/// | suggest | `POST /v1/suggest` |
/// | graphql | `POST /v1/graphql` |
///
/// Non-2xx responses become [`TransportError::Http`]. Mock hints ride along as query
/// parameters.
#[derive(Clone)]
pub struct JsonTransport {
	http: ReqwestHttpClient,
	base: Url,
	tokens: Option<Arc<dyn TokenSource>>,
	on_response: Option<ResponseHook>,
}
impl JsonTransport {
	/// Builds a client rooted at `base_url`; a missing scheme becomes `https://` or `http://`.
	pub fn new(base_url: &str, secure: bool, http: ReqwestHttpClient) -> Result<Self, ConfigError> {
		let raw = transport::with_scheme(base_url.trim(), secure);
		let base = Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
			field: "rest base",
			value: raw.clone(),
			source,
		})?;

		if base.cannot_be_a_base() {
			return Err(ConfigError::InvalidUrl {
				field: "rest base",
				value: raw,
				source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
			});
		}

		Ok(Self { http, base, tokens: None, on_response: None })
	}

	/// Attaches the token source used for `Authorization`.
	pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
		self.tokens = Some(tokens);

		self
	}

	/// Installs a hook that sees every raw response.
	pub fn with_response_hook(mut self, hook: ResponseHook) -> Self {
		self.on_response = Some(hook);

		self
	}

	/// Base URL requests are resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base
	}

	/// Posts a free-form GraphQL document and returns the raw JSON reply.
	pub async fn graphql(
		&self,
		ctx: &CallContext,
		request: &GraphQlRequest,
	) -> Result<serde_json::Value> {
		obs::observe(CallKind::GraphQl, "json", async {
			let url = self.endpoint(&["v1", "graphql"], ctx);
			let body = self.send(ctx, self.http.post(url).json(request)).await?;

			decode(&body)
		})
		.await
	}

	fn endpoint(&self, segments: &[&str], ctx: &CallContext) -> Url {
		let mut url = self.base.clone();

		if let Ok(mut path) = url.path_segments_mut() {
			path.pop_if_empty().extend(segments);
		}
		if !ctx.mock_hints.is_empty() {
			url.query_pairs_mut().extend_pairs(ctx.mock_hints.iter());
		}

		url
	}

	async fn send(&self, ctx: &CallContext, request: RequestBuilder) -> Result<Vec<u8>> {
		let mut request = request.header(ACCEPT, "application/json");

		if let Some(value) = transport::authorization(self.tokens.as_ref()).await? {
			request = request.header(AUTHORIZATION, value);
		}
		if let Some(tag) = ctx.client_trace_tag() {
			request = request.header(CLIENT_TRACE_HEADER, tag);
		}

		let response = request.send().await.map_err(TransportError::from)?;
		let status = response.status();

		ctx.record(ResponseMetadata::from_headers(status.as_u16(), response.headers()));

		if let Some(hook) = &self.on_response {
			hook(&response);
		}
		if !status.is_success() {
			return Err(TransportError::Http {
				status: status.as_u16(),
				reason: status.canonical_reason().unwrap_or("unknown status").to_owned(),
			}
			.into());
		}

		Ok(response.bytes().await.map_err(TransportError::from)?.to_vec())
	}
}
impl Transport for JsonTransport {
	fn query<'a>(
		&'a self,
		ctx: &'a CallContext,
		request: &'a QueryRequest,
	) -> TransportFuture<'a, QueryReply> {
		Box::pin(obs::observe(CallKind::Query, "json", async move {
			let url = self.endpoint(&["v1", "query"], ctx);
			let body = self.send(ctx, self.http.post(url).json(request)).await?;

			decode(&body)
		}))
	}

	fn result<'a>(
		&'a self,
		ctx: &'a CallContext,
		request_id: &'a str,
	) -> TransportFuture<'a, QueryResult> {
		Box::pin(obs::observe(CallKind::Result, "json", async move {
			let url = self.endpoint(&["v1", "query", request_id], ctx);
			let body = self.send(ctx, self.http.get(url)).await?;

			decode(&body)
		}))
	}

	fn suggest<'a>(
		&'a self,
		ctx: &'a CallContext,
		request: &'a SuggestRequest,
	) -> TransportFuture<'a, ()> {
		Box::pin(obs::observe(CallKind::Suggest, "json", async move {
			let url = self.endpoint(&["v1", "suggest"], ctx);

			self.send(ctx, self.http.post(url).json(request)).await.map(drop)
		}))
	}
}
impl Debug for JsonTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JsonTransport")
			.field("base", &self.base.as_str())
			.field("authenticated", &self.tokens.is_some())
			.finish()
	}
}

fn decode<T>(body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TransportError::Decode { source }.into())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn base_url_gains_scheme() {
		let secure = JsonTransport::new(DEFAULT_REST_BASE_URL, true, ReqwestHttpClient::default())
			.expect("Default base should parse.");
		let plain = JsonTransport::new("localhost:8080", false, ReqwestHttpClient::default())
			.expect("Plain base should parse.");

		assert_eq!(secure.base_url().as_str(), "https://api.zvelo.com/");
		assert_eq!(plain.base_url().as_str(), "http://localhost:8080/");
	}

	#[test]
	fn endpoints_keep_base_path_and_hints() {
		let transport =
			JsonTransport::new("https://mock.example/api/", true, ReqwestHttpClient::default())
				.expect("Base with path should parse.");
		let ctx = CallContext::default()
			.with_mock_hints(vec![("mock_fetch_code".into(), "301".into())]);

		assert_eq!(
			transport.endpoint(&["v1", "query", "R 1"], &CallContext::default()).as_str(),
			"https://mock.example/api/v1/query/R%201"
		);
		assert_eq!(
			transport.endpoint(&["v1", "query"], &ctx).as_str(),
			"https://mock.example/api/v1/query?mock_fetch_code=301"
		);
	}

	#[test]
	fn decode_reports_path() {
		let err = decode::<QueryReply>(br#"{"reply":[{"request_id":5}]}"#)
			.expect_err("Numeric request ID should fail to decode.");

		match err {
			Error::Transport(TransportError::Decode { source }) =>
				assert_eq!(source.path().to_string(), "reply[0].request_id"),
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
