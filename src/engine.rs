//! Query engine: submits targets, tracks their request IDs, and collects results until every
//! request completes or the deadline passes.
//!
//! Results arrive either by polling ([`Poller`]) or pushed to a local [`CallbackReceiver`]; both
//! feed the same [`QueryHandler`], which renders results, follows redirects, and releases the
//! wait group.

pub mod content;
pub mod handler;
pub mod wait_group;

pub use content::*;
pub use handler::*;
pub use wait_group::*;

// crates.io
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	callback::CallbackReceiver,
	error::InputError,
	httpsig::Verifier,
	model::{DatasetType, QueryRequest},
	poller::{DEFAULT_POLL_INTERVAL, PendingSet, Poller},
	present::Presenter,
	transport::{CallContext, Transport},
};

/// Default overall deadline for one invocation.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15 * 60);

/// Knobs shared by the `query` and `poll` commands.
#[derive(Clone, Debug)]
pub struct EngineOptions {
	/// Poll for results after submitting.
	pub poll: bool,
	/// Follow redirects reported in results.
	pub follow_redirects: bool,
	/// Maximum redirect chain length.
	pub redirect_limit: usize,
	/// Overall deadline.
	pub timeout: std::time::Duration,
	/// Delay between polling passes.
	pub poll_interval: std::time::Duration,
	/// Stop after a single polling pass.
	pub once: bool,
	/// Options every call starts from.
	pub ctx: CallContext,
}
impl Default for EngineOptions {
	fn default() -> Self {
		Self {
			poll: true,
			follow_redirects: true,
			redirect_limit: DEFAULT_REDIRECT_LIMIT,
			timeout: DEFAULT_TIMEOUT,
			poll_interval: DEFAULT_POLL_INTERVAL,
			once: false,
			ctx: CallContext::default(),
		}
	}
}

/// Local receiver the service should post results to.
#[derive(Clone)]
pub struct CallbackOptions {
	/// Address to listen on, e.g. `:8080`.
	pub listen: String,
	/// Public callback URL sent with the query.
	pub url: String,
	/// Signature verifier applied to incoming callbacks.
	pub verifier: Option<Arc<Verifier>>,
}
impl Debug for CallbackOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallbackOptions")
			.field("listen", &self.listen)
			.field("url", &self.url)
			.field("verified", &self.verifier.is_some())
			.finish()
	}
}

/// Runs one user command against a transport.
pub struct QueryEngine {
	transport: Arc<dyn Transport>,
	presenter: Arc<dyn Presenter>,
	options: EngineOptions,
	callback: Option<CallbackOptions>,
}
impl QueryEngine {
	/// Creates an engine with default options.
	pub fn new(transport: Arc<dyn Transport>, presenter: Arc<dyn Presenter>) -> Self {
		Self { transport, presenter, options: EngineOptions::default(), callback: None }
	}

	/// Replaces the options.
	pub fn with_options(mut self, options: EngineOptions) -> Self {
		self.options = options;

		self
	}

	/// Receives results through a local callback endpoint instead of polling.
	pub fn with_callback(mut self, callback: CallbackOptions) -> Self {
		self.callback = Some(callback);

		self
	}

	/// Submits `request` and waits for its results.
	///
	/// Returns once every accepted request completed, immediately when nothing is awaited, or
	/// with [`Error::Timeout`] when the deadline passes first.
	pub async fn query(&self, request: QueryRequest) -> Result<()> {
		let request = match &self.callback {
			Some(callback) if request.callback.is_empty() => request.with_callback(&callback.url),
			_ => request,
		};

		request.validate()?;

		let deadline = Instant::now() + self.options.timeout;
		let cancel = CancellationToken::new();
		let handler = Arc::new(self.handler(&request));
		let receiver = match &self.callback {
			Some(callback) =>
				Some(self.spawn_receiver(callback, &request, &handler, &cancel).await?),
			None => None,
		};
		let outcome = time::timeout_at(deadline, self.submit(&handler, &request, &cancel))
			.await
			.unwrap_or(Err(Error::Timeout));

		cancel.cancel();

		if let Some(receiver) = receiver {
			match receiver.await {
				Ok(Ok(())) => {},
				Ok(Err(e)) => tracing::warn!(error = %e, "Callback receiver failed."),
				Err(e) => tracing::warn!(error = %e, "Callback receiver task failed."),
			}
		}

		outcome
	}

	/// Polls existing request IDs until they complete.
	pub async fn poll(
		&self,
		request_ids: &[String],
		datasets: impl IntoIterator<Item = DatasetType>,
	) -> Result<()> {
		if request_ids.is_empty() {
			return Err(InputError::NoRequestIds.into());
		}

		let deadline = Instant::now() + self.options.timeout;
		let cancel = CancellationToken::new();
		let handler = Arc::new(self.handler(&QueryRequest::new(datasets)));
		let pending = request_ids
			.iter()
			.map(|request_id| {
				handler.track(request_id, request_id, None, None);

				(request_id.clone(), request_id.clone())
			})
			.collect::<PendingSet>();
		let outcome = time::timeout_at(deadline, self.drain(&handler, pending, &cancel))
			.await
			.unwrap_or(Err(Error::Timeout));

		cancel.cancel();

		outcome
	}

	fn handler(&self, template: &QueryRequest) -> QueryHandler {
		QueryHandler::new(self.transport.clone(), self.presenter.clone(), template)
			.with_redirects(self.options.follow_redirects, self.options.redirect_limit)
			.with_context(self.options.ctx.clone())
	}

	async fn spawn_receiver(
		&self,
		callback: &CallbackOptions,
		request: &QueryRequest,
		handler: &Arc<QueryHandler>,
		cancel: &CancellationToken,
	) -> Result<tokio::task::JoinHandle<Result<()>>> {
		let path = Url::parse(&request.callback)
			.map(|url| url.path().to_owned())
			.unwrap_or_else(|_| "/".into());
		let mut receiver = CallbackReceiver::bind(&callback.listen, &path, handler.clone()).await?;

		if let Some(verifier) = &callback.verifier {
			receiver = receiver.with_verifier(verifier.clone());
		}

		Ok(tokio::spawn(receiver.serve(cancel.clone())))
	}

	async fn submit(
		&self,
		handler: &Arc<QueryHandler>,
		request: &QueryRequest,
		cancel: &CancellationToken,
	) -> Result<()> {
		let ctx = self.options.ctx.fork();
		let reply = self.transport.query(&ctx, request).await?;

		handler.echo_trace(&ctx);

		let pending = handler.record_reply(request, &reply, None);

		if pending.is_empty() {
			return Ok(());
		}
		if self.callback.is_some() {
			handler.wait().await;

			return Ok(());
		}
		if !self.options.poll {
			tracing::debug!(pending = pending.len(), "Polling disabled; not waiting for results.");

			return Ok(());
		}

		self.drain(handler, pending, cancel).await
	}

	async fn drain(
		&self,
		handler: &Arc<QueryHandler>,
		pending: PendingSet,
		cancel: &CancellationToken,
	) -> Result<()> {
		let poller = Poller::new(self.transport.clone(), handler.clone())
			.with_interval(self.options.poll_interval)
			.with_once(self.options.once)
			.with_context(self.options.ctx.clone());
		let remaining = poller.run(pending, &cancel.child_token()).await;

		if !remaining.is_empty() {
			tracing::info!(
				remaining = remaining.len(),
				"Stopped polling with requests outstanding."
			);

			return Ok(());
		}

		handler.wait().await;

		Ok(())
	}
}
impl Debug for QueryEngine {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("QueryEngine")
			.field("options", &self.options)
			.field("callback", &self.callback)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, present::RecordingPresenter};

	#[tokio::test]
	async fn invalid_request_sends_nothing() {
		let transport = Arc::new(ScriptedTransport::default());
		let engine = QueryEngine::new(transport.clone(), Arc::new(RecordingPresenter::default()));
		let err = engine
			.query(QueryRequest::new([DatasetType::Categorization]))
			.await
			.expect_err("A request without targets should be rejected.");

		assert!(matches!(err, Error::Input(InputError::NoTargets)));
		assert!(transport.queries().is_empty());
	}

	#[tokio::test]
	async fn poll_requires_request_ids() {
		let engine = QueryEngine::new(
			Arc::new(ScriptedTransport::default()),
			Arc::new(RecordingPresenter::default()),
		);
		let err = engine
			.poll(&[], [DatasetType::Categorization])
			.await
			.expect_err("Polling nothing should be rejected.");

		assert!(matches!(err, Error::Input(InputError::NoRequestIds)));
	}

	#[tokio::test]
	async fn no_poll_returns_after_reply() {
		let transport = Arc::new(
			ScriptedTransport::default().with_reply("http://a", "R1").with_results("R1", [
				completed("R1"),
			]),
		);
		let presenter = Arc::new(RecordingPresenter::default());
		let engine = QueryEngine::new(transport.clone(), presenter.clone())
			.with_options(EngineOptions { poll: false, ..Default::default() });

		engine
			.query(QueryRequest::new([DatasetType::Categorization]).with_urls(["http://a"]))
			.await
			.expect("Query without polling should succeed.");

		assert_eq!(transport.total_result_calls(), 0);
		assert!(presenter.results().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn once_stops_after_one_pass() {
		let transport = Arc::new(
			ScriptedTransport::default().with_reply("http://a", "R1").with_results("R1", [
				incomplete("R1"),
			]),
		);
		let engine = QueryEngine::new(transport.clone(), Arc::new(RecordingPresenter::default()))
			.with_options(EngineOptions { once: true, ..Default::default() });

		engine
			.query(QueryRequest::new([DatasetType::Categorization]).with_urls(["http://a"]))
			.await
			.expect("A single pass should end without error.");

		assert_eq!(transport.result_calls("R1"), 1);
	}
}
