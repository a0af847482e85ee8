//! Command-line client for the zvelo URL categorization service: submit URLs or content over
//! gRPC or JSON, collect results by polling or signed callbacks, and keep OAuth 2.0 credentials
//! cached between runs.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod callback;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod flows;
pub mod http;
pub mod httpsig;
pub mod model;
pub mod oauth;
pub mod obs;
pub mod poller;
pub mod present;
pub mod store;
pub mod transport;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// self
	use crate::{
		error::TransportError,
		http::{ReqwestHttpClient, ResponseMetadata},
		model::{
			Categorization, Category, Dataset, QueryReply, QueryReplyEntry, QueryRequest,
			QueryResult, QueryStatus, Status, SuggestRequest,
		},
		transport::{CallContext, Transport, TransportFuture},
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// A finished result without datasets.
	pub fn completed(request_id: &str) -> QueryResult {
		QueryResult {
			request_id: request_id.to_owned(),
			query_status: QueryStatus { complete: true, fetch_code: 200, ..Default::default() },
			..Default::default()
		}
	}

	/// A result that is still being processed.
	pub fn incomplete(request_id: &str) -> QueryResult {
		QueryResult { request_id: request_id.to_owned(), ..Default::default() }
	}

	/// A finished result whose fetch ended in a `301` to `location`.
	pub fn redirected(request_id: &str, location: &str) -> QueryResult {
		QueryResult {
			request_id: request_id.to_owned(),
			query_status: QueryStatus {
				complete: true,
				fetch_code: 301,
				location: location.to_owned(),
				..Default::default()
			},
			..Default::default()
		}
	}

	/// A finished result for `url` tagged with `categories`.
	pub fn completed_with(
		request_id: &str,
		url: &str,
		categories: impl IntoIterator<Item = Category>,
	) -> QueryResult {
		QueryResult {
			url: url.to_owned(),
			response_dataset: Dataset {
				categorization: Some(Categorization {
					value: categories.into_iter().collect(),
					error: None,
				}),
				..Default::default()
			},
			..completed(request_id)
		}
	}

	/// In-memory [`Transport`] answering from a script.
	///
	/// Queries accept every target registered with [`with_reply`](Self::with_reply) and reject
	/// the rest. Each request ID serves its scripted results in order; the last one repeats.
	/// Failures scheduled with [`with_failures`](Self::with_failures) come first.
	#[derive(Default)]
	pub struct ScriptedTransport {
		replies: HashMap<String, String>,
		trace_id: Option<String>,
		results: Mutex<HashMap<String, VecDeque<QueryResult>>>,
		failures: Mutex<HashMap<String, usize>>,
		calls: Mutex<HashMap<String, usize>>,
		queries: Mutex<Vec<QueryRequest>>,
		suggestions: Mutex<Vec<SuggestRequest>>,
	}
	impl ScriptedTransport {
		/// Accepts `target` (URL or content) under `request_id`.
		pub fn with_reply(mut self, target: &str, request_id: &str) -> Self {
			self.replies.insert(target.to_owned(), request_id.to_owned());

			self
		}

		/// Queues results for `request_id`.
		pub fn with_results(
			self,
			request_id: &str,
			results: impl IntoIterator<Item = QueryResult>,
		) -> Self {
			self.results.lock().entry(request_id.to_owned()).or_default().extend(results);

			self
		}

		/// Fails the first `count` result calls for `request_id`.
		pub fn with_failures(self, request_id: &str, count: usize) -> Self {
			*self.failures.lock().entry(request_id.to_owned()).or_default() += count;

			self
		}

		/// Reports `trace_id` as the service trace header on every query.
		pub fn with_trace_id(mut self, trace_id: &str) -> Self {
			self.trace_id = Some(trace_id.to_owned());

			self
		}

		/// Submitted queries.
		pub fn queries(&self) -> Vec<QueryRequest> {
			self.queries.lock().clone()
		}

		/// Submitted suggestions.
		pub fn suggestions(&self) -> Vec<SuggestRequest> {
			self.suggestions.lock().clone()
		}

		/// Result calls made for `request_id`.
		pub fn result_calls(&self, request_id: &str) -> usize {
			self.calls.lock().get(request_id).copied().unwrap_or_default()
		}

		/// Result calls made in total.
		pub fn total_result_calls(&self) -> usize {
			self.calls.lock().values().sum()
		}

		fn next_result(&self, request_id: &str) -> Result<QueryResult> {
			*self.calls.lock().entry(request_id.to_owned()).or_default() += 1;

			if let Some(remaining) = self.failures.lock().get_mut(request_id)
				&& *remaining > 0
			{
				*remaining -= 1;

				return Err(TransportError::Http {
					status: 503,
					reason: "Service Unavailable".into(),
				}
				.into());
			}

			let mut results = self.results.lock();
			let queue = results.get_mut(request_id).ok_or_else(|| TransportError::Http {
				status: 404,
				reason: "Not Found".into(),
			})?;

			match queue.len() {
				0 => Err(TransportError::Http { status: 404, reason: "Not Found".into() }.into()),
				1 => Ok(queue[0].clone()),
				_ => Ok(queue.pop_front().unwrap_or_default()),
			}
		}
	}
	impl Transport for ScriptedTransport {
		fn query<'a>(
			&'a self,
			ctx: &'a CallContext,
			request: &'a QueryRequest,
		) -> TransportFuture<'a, QueryReply> {
			Box::pin(async move {
				self.queries.lock().push(request.clone());

				if let Some(trace_id) = &self.trace_id {
					ctx.record(ResponseMetadata {
						status: Some(200),
						trace_id: Some(trace_id.clone()),
						..Default::default()
					});
				}

				let reply = request
					.url
					.iter()
					.chain(request.content.iter())
					.map(|target| match self.replies.get(target) {
						Some(request_id) => QueryReplyEntry::accepted(request_id.clone()),
						None => QueryReplyEntry::rejected(Status::new(
							3,
							format!("unknown target {target}"),
						)),
					})
					.collect();

				Ok(QueryReply { reply })
			})
		}

		fn result<'a>(
			&'a self,
			_ctx: &'a CallContext,
			request_id: &'a str,
		) -> TransportFuture<'a, QueryResult> {
			Box::pin(async move { self.next_result(request_id) })
		}

		fn suggest<'a>(
			&'a self,
			_ctx: &'a CallContext,
			request: &'a SuggestRequest,
		) -> TransportFuture<'a, ()> {
			Box::pin(async move {
				self.suggestions.lock().push(request.clone());

				Ok(())
			})
		}
	}
	impl Debug for ScriptedTransport {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			f.debug_struct("ScriptedTransport").field("replies", &self.replies).finish()
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, rand_core as _};
