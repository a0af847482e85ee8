//! Observability helpers for service calls.
//!
//! Every outbound call runs inside a span named `zvelo_client.call` carrying the `call` (RPC
//! method) and `stage` (transport or grant) fields. With the `metrics` feature enabled,
//! `zvelo_client_call_total{call,stage,outcome}` counts attempts and outcomes, and
//! `zvelo_client_call_duration_seconds{call,stage}` records latencies.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Service calls observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Submits URLs or content for categorization.
	Query,
	/// Fetches the current result for one request ID.
	Result,
	/// Suggests a dataset correction for a URL.
	Suggest,
	/// Server-streamed results.
	Stream,
	/// Free-form GraphQL document.
	GraphQl,
	/// OAuth 2.0 token endpoint exchange.
	Token,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Query => "query",
			CallKind::Result => "result",
			CallKind::Suggest => "suggest",
			CallKind::Stream => "stream",
			CallKind::GraphQl => "graphql",
			CallKind::Token => "token",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a call helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}

	/// Maps a result onto its success/failure label.
	pub fn of<T, E>(result: &std::result::Result<T, E>) -> Self {
		if result.is_ok() { CallOutcome::Success } else { CallOutcome::Failure }
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs a service call inside its span and records its outcome and latency.
pub(crate) async fn observe<T, F>(kind: CallKind, stage: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	record_call_outcome(kind, stage, CallOutcome::Attempt);

	let started = tokio::time::Instant::now();
	let result = CallSpan::new(kind, stage).instrument(fut).await;

	record_call_latency(kind, stage, started.elapsed());
	record_call_outcome(kind, stage, CallOutcome::of(&result));

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn observe_passes_results_through() {
		let ok = observe(CallKind::Query, "json", async { Ok(7) }).await;
		let err = observe(CallKind::Result, "rpc", async { Err::<(), _>(Error::Timeout) }).await;

		assert_eq!(ok.expect("Successful call should pass through."), 7);
		assert!(matches!(err, Err(Error::Timeout)));
	}

	#[test]
	fn outcome_follows_the_result() {
		assert_eq!(CallOutcome::of(&Ok::<_, ()>(1)), CallOutcome::Success);
		assert_eq!(CallOutcome::of(&Err::<(), _>(())), CallOutcome::Failure);
		assert_eq!(CallKind::GraphQl.to_string(), "graphql");
	}
}
