//! Drives pending requests to completion by repeatedly fetching their results.

// crates.io
use tokio::{
	task::JoinSet,
	time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	model::QueryResult,
	transport::{CallContext, Transport},
};

/// Default delay between polling passes.
pub const DEFAULT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Request ID to display label.
pub type PendingSet = BTreeMap<String, String>;

/// Future returned by [`ResultHandler::handle`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = PendingSet> + 'a + Send>>;

/// Consumes results as they arrive and may hand back more requests to track.
pub trait ResultHandler
where
	Self: Send + Sync,
{
	/// Handles one result, returning new request IDs to add to the pending set.
	fn handle<'a>(&'a self, ctx: &'a CallContext, result: QueryResult) -> HandlerFuture<'a>;
}

/// Periodically fetches results for every pending request.
///
/// The first pass runs immediately. Each pass issues one `Result` call per pending request
/// concurrently; failed calls keep their entry for the next pass, incomplete results keep
/// theirs, and entries returned by the handler join the next pass.
pub struct Poller {
	transport: Arc<dyn Transport>,
	handler: Arc<dyn ResultHandler>,
	ctx: CallContext,
	interval: std::time::Duration,
	once: bool,
}
impl Poller {
	/// Creates a poller with the default interval.
	pub fn new(transport: Arc<dyn Transport>, handler: Arc<dyn ResultHandler>) -> Self {
		Self {
			transport,
			handler,
			ctx: CallContext::default(),
			interval: DEFAULT_POLL_INTERVAL,
			once: false,
		}
	}

	/// Sets the delay between passes.
	pub fn with_interval(mut self, interval: std::time::Duration) -> Self {
		self.interval = interval;

		self
	}

	/// Stops after the first pass.
	pub fn with_once(mut self, once: bool) -> Self {
		self.once = once;

		self
	}

	/// Sets the call options each `Result` call starts from.
	pub fn with_context(mut self, ctx: CallContext) -> Self {
		self.ctx = ctx;

		self
	}

	/// Polls until `pending` drains, `once` is set, or `cancel` fires; returns what is left.
	pub async fn run(&self, mut pending: PendingSet, cancel: &CancellationToken) -> PendingSet {
		if pending.is_empty() {
			return pending;
		}

		let mut ticker = time::interval(self.interval);

		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => return pending,
				_ = ticker.tick() => {},
			}

			match self.pass(&pending, cancel).await {
				Some(next) => pending = next,
				None => return pending,
			}

			tracing::debug!(remaining = pending.len(), "Finished polling pass.");

			if pending.is_empty() || self.once {
				return pending;
			}
		}
	}

	async fn pass(&self, pending: &PendingSet, cancel: &CancellationToken) -> Option<PendingSet> {
		let mut calls = JoinSet::new();

		for (request_id, label) in pending.clone() {
			let transport = self.transport.clone();
			let handler = self.handler.clone();
			let ctx = self.ctx.fork();

			calls.spawn(async move {
				poll_one(transport.as_ref(), handler.as_ref(), &ctx, request_id, label).await
			});
		}

		let mut next = PendingSet::new();

		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => {
					calls.abort_all();

					return None;
				},
				joined = calls.join_next() => match joined {
					Some(Ok(entries)) => next.extend(entries),
					Some(Err(e)) => tracing::error!(error = %e, "Polling task failed."),
					None => return Some(next),
				},
			}
		}
	}
}
impl Debug for Poller {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Poller")
			.field("interval", &self.interval)
			.field("once", &self.once)
			.finish()
	}
}

async fn poll_one(
	transport: &dyn Transport,
	handler: &dyn ResultHandler,
	ctx: &CallContext,
	request_id: String,
	label: String,
) -> PendingSet {
	let mut next = PendingSet::new();

	match transport.result(ctx, &request_id).await {
		Ok(mut result) => {
			if result.request_id.is_empty() {
				result.request_id = request_id.clone();
			}
			if !result.is_complete() {
				next.insert(request_id, label);
			}

			next.extend(handler.handle(ctx, result).await);
		},
		Err(e) => {
			tracing::warn!(
				%request_id,
				error = %e,
				"Result call failed; retrying on the next pass."
			);

			next.insert(request_id, label);
		},
	}

	next
}

#[cfg(test)]
mod tests {
	// crates.io
	use tokio::time::Instant;
	// self
	use super::*;
	use crate::_preludet::*;

	#[derive(Default)]
	struct Collect {
		seen: Mutex<Vec<QueryResult>>,
		spawn: Mutex<PendingSet>,
	}
	impl ResultHandler for Collect {
		fn handle<'a>(&'a self, _ctx: &'a CallContext, result: QueryResult) -> HandlerFuture<'a> {
			Box::pin(async move {
				let spawned = if result.is_complete() {
					std::mem::take(&mut *self.spawn.lock())
				} else {
					PendingSet::new()
				};

				self.seen.lock().push(result);

				spawned
			})
		}
	}

	fn pending(ids: &[&str]) -> PendingSet {
		ids.iter().map(|id| ((*id).to_owned(), format!("http://{id}"))).collect()
	}

	fn poller(transport: Arc<ScriptedTransport>, handler: Arc<Collect>) -> Poller {
		Poller::new(transport, handler).with_interval(std::time::Duration::from_millis(100))
	}

	#[tokio::test]
	async fn empty_set_issues_no_calls() {
		let transport = Arc::new(ScriptedTransport::default());
		let left = poller(transport.clone(), Arc::default())
			.run(PendingSet::new(), &CancellationToken::new())
			.await;

		assert!(left.is_empty());
		assert_eq!(transport.total_result_calls(), 0);
	}

	#[tokio::test]
	async fn cancellation_before_first_tick_issues_no_calls() {
		let transport =
			Arc::new(ScriptedTransport::default().with_results("R1", [completed("R1")]));
		let cancel = CancellationToken::new();

		cancel.cancel();

		let left = poller(transport.clone(), Arc::default()).run(pending(&["R1"]), &cancel).await;

		assert_eq!(left, pending(&["R1"]));
		assert_eq!(transport.total_result_calls(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn polls_until_every_request_completes() {
		let transport = Arc::new(
			ScriptedTransport::default()
				.with_results("R1", [completed("R1")])
				.with_results("R2", [incomplete("R2"), completed("R2")]),
		);
		let handler = Arc::new(Collect::default());
		let started = Instant::now();
		let left = poller(transport.clone(), handler.clone())
			.run(pending(&["R1", "R2"]), &CancellationToken::new())
			.await;

		assert!(left.is_empty());
		assert!(started.elapsed() >= std::time::Duration::from_millis(100));
		assert_eq!(transport.result_calls("R1"), 1);
		assert_eq!(transport.result_calls("R2"), 2);
		assert_eq!(handler.seen.lock().iter().filter(|result| result.is_complete()).count(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn results_without_an_id_carry_the_polled_id() {
		let transport = Arc::new(
			ScriptedTransport::default()
				.with_results("R1", [completed("")])
				.with_results("R2", [incomplete(""), completed("")]),
		);
		let handler = Arc::new(Collect::default());
		let left = poller(transport.clone(), handler.clone())
			.run(pending(&["R1", "R2"]), &CancellationToken::new())
			.await;
		let mut seen =
			handler.seen.lock().iter().map(|result| result.request_id.clone()).collect::<Vec<_>>();

		seen.sort();

		assert!(left.is_empty());
		assert_eq!(seen, ["R1", "R2", "R2"]);
	}

	#[tokio::test(start_paused = true)]
	async fn failed_calls_are_retried() {
		let transport = Arc::new(
			ScriptedTransport::default()
				.with_failures("R1", 1)
				.with_results("R1", [completed("R1")]),
		);
		let left = poller(transport.clone(), Arc::default())
			.run(pending(&["R1"]), &CancellationToken::new())
			.await;

		assert!(left.is_empty());
		assert_eq!(transport.result_calls("R1"), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn handler_entries_join_the_next_pass() {
		let transport = Arc::new(
			ScriptedTransport::default()
				.with_results("R1", [completed("R1")])
				.with_results("R2", [completed("R2")]),
		);
		let handler = Arc::new(Collect::default());

		handler.spawn.lock().insert("R2".into(), "http://dst".into());

		let left = poller(transport.clone(), handler.clone())
			.run(pending(&["R1"]), &CancellationToken::new())
			.await;

		assert!(left.is_empty());
		assert_eq!(transport.result_calls("R2"), 1);
		assert_eq!(handler.seen.lock().len(), 2);
	}

	#[tokio::test]
	async fn once_stops_after_one_pass() {
		let transport =
			Arc::new(ScriptedTransport::default().with_results("R1", [incomplete("R1")]));
		let left = poller(transport.clone(), Arc::default())
			.with_once(true)
			.run(pending(&["R1"]), &CancellationToken::new())
			.await;

		assert_eq!(left, pending(&["R1"]));
		assert_eq!(transport.result_calls("R1"), 1);
	}
}
