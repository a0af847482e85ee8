// std
use std::time::Duration as StdDuration;
// self
use crate::obs::{CallKind, CallOutcome};

/// Counter bumped once per attempt and once per finished call.
pub const CALL_TOTAL: &str = "zvelo_client_call_total";
/// Histogram of finished call latencies, in seconds.
pub const CALL_DURATION: &str = "zvelo_client_call_duration_seconds";

/// Counts `outcome` for a `kind` call issued from `stage`.
pub fn record_call_outcome(kind: CallKind, stage: &'static str, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			CALL_TOTAL,
			"call" => kind.as_str(),
			"stage" => stage,
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, stage, outcome);
	}
}

/// Records how long a finished `kind` call took, successful or not.
pub fn record_call_latency(kind: CallKind, stage: &'static str, elapsed: StdDuration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!(CALL_DURATION, "call" => kind.as_str(), "stage" => stage)
			.record(elapsed.as_secs_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, stage, elapsed);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_without_a_recorder_is_harmless() {
		for kind in [CallKind::Query, CallKind::Stream, CallKind::Token] {
			record_call_outcome(kind, "rpc", CallOutcome::Attempt);
			record_call_outcome(kind, "rpc", CallOutcome::Failure);
			record_call_latency(kind, "rpc", StdDuration::from_millis(12));
		}
	}
}
