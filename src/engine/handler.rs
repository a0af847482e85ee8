//! Result handler that renders results, follows redirects, and releases the wait group.

// std
use std::collections::HashSet;
// crates.io
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	engine::WaitGroup,
	model::{QueryReply, QueryRequest, QueryResult, content_label},
	poller::{HandlerFuture, PendingSet, ResultHandler},
	present::{Event, Presenter},
	transport::{CallContext, Transport},
};

/// Default maximum redirect chain length.
pub const DEFAULT_REDIRECT_LIMIT: usize = 5;

struct Tracked {
	label: String,
	url: Option<String>,
	parent: Option<String>,
	started: Instant,
}

#[derive(Default)]
struct Tracker {
	entries: HashMap<String, Tracked>,
	done: HashSet<String>,
}
impl Tracker {
	fn depth(&self, request_id: &str) -> usize {
		let mut depth = 0;
		let mut current = request_id;

		while let Some(parent) = self.entries.get(current).and_then(|entry| entry.parent.as_deref())
		{
			depth += 1;
			current = parent;
		}

		depth
	}
}

struct Claim {
	tracked: bool,
	label: String,
	url: Option<String>,
	elapsed: Option<std::time::Duration>,
	depth: usize,
}

/// Tracks the requests of one invocation.
///
/// Every accepted request ID adds one to the wait group; the first complete result for it
/// releases that slot. A redirect hop is registered before its parent is released, so the group
/// cannot drain while a chain is still being followed.
pub struct QueryHandler {
	transport: Arc<dyn Transport>,
	presenter: Arc<dyn Presenter>,
	template: QueryRequest,
	ctx: CallContext,
	follow_redirects: bool,
	redirect_limit: usize,
	tracker: Mutex<Tracker>,
	wait_group: WaitGroup,
}
impl QueryHandler {
	/// Creates a handler; redirect queries reuse `template`'s datasets and callback.
	pub fn new(
		transport: Arc<dyn Transport>,
		presenter: Arc<dyn Presenter>,
		template: &QueryRequest,
	) -> Self {
		Self {
			transport,
			presenter,
			template: QueryRequest {
				dataset: template.dataset.clone(),
				callback: template.callback.clone(),
				..Default::default()
			},
			ctx: CallContext::default(),
			follow_redirects: true,
			redirect_limit: DEFAULT_REDIRECT_LIMIT,
			tracker: Mutex::new(Tracker::default()),
			wait_group: WaitGroup::default(),
		}
	}

	/// Configures redirect following.
	pub fn with_redirects(mut self, follow: bool, limit: usize) -> Self {
		self.follow_redirects = follow;
		self.redirect_limit = limit;

		self
	}

	/// Sets the call options redirect queries start from.
	pub fn with_context(mut self, ctx: CallContext) -> Self {
		self.ctx = ctx;

		self
	}

	/// Starts tracking `request_id`.
	pub fn track(
		&self,
		request_id: &str,
		label: &str,
		url: Option<String>,
		parent: Option<String>,
	) {
		let mut tracker = self.tracker.lock();

		if tracker.entries.contains_key(request_id) {
			return;
		}

		tracker.entries.insert(request_id.to_owned(), Tracked {
			label: label.to_owned(),
			url,
			parent,
			started: Instant::now(),
		});
		self.wait_group.add(1);
	}

	/// Tracks every accepted entry of `reply` and presents the outcome of each target.
	///
	/// Entries match targets by position: URLs first, then contents.
	pub fn record_reply(
		&self,
		request: &QueryRequest,
		reply: &QueryReply,
		parent: Option<&str>,
	) -> PendingSet {
		let targets = request
			.url
			.iter()
			.map(|url| (url.clone(), Some(url.clone())))
			.chain(request.content.iter().map(|content| (content_label(content), None)))
			.collect::<Vec<_>>();
		let mut pending = PendingSet::new();

		for (index, entry) in reply.reply.iter().enumerate() {
			let (label, url) =
				targets.get(index).cloned().unwrap_or_else(|| (entry.request_id.clone(), None));

			if let Some(error) = &entry.error {
				self.presenter.present(Event::ReplyError { label, error: error.clone() });

				continue;
			}
			if entry.request_id.is_empty() {
				tracing::warn!(%label, "Reply entry carries neither a request ID nor an error.");

				continue;
			}

			self.track(&entry.request_id, &label, url, parent.map(str::to_owned));

			let event = match parent {
				Some(parent) => Event::Redirect {
					from_request_id: parent.to_owned(),
					location: label.clone(),
					request_id: entry.request_id.clone(),
					depth: self.redirect_depth(&entry.request_id),
				},
				None => Event::Reply { label: label.clone(), request_id: entry.request_id.clone() },
			};

			self.presenter.present(event);
			pending.insert(entry.request_id.clone(), label);
		}

		pending
	}

	/// Redirect hops between `request_id` and the request the user submitted.
	pub fn redirect_depth(&self, request_id: &str) -> usize {
		self.tracker.lock().depth(request_id)
	}

	/// Requests still awaiting a complete result.
	pub fn outstanding(&self) -> usize {
		self.wait_group.count()
	}

	/// Resolves once every tracked request completed.
	pub async fn wait(&self) {
		self.wait_group.wait().await;
	}

	/// Presents a service trace ID reported on `ctx`.
	pub fn echo_trace(&self, ctx: &CallContext) {
		if let Some(trace_id) = ctx.trace_id() {
			self.presenter.present(Event::service_trace(&trace_id));
		}
	}

	fn claim(&self, result: &QueryResult) -> Option<Claim> {
		let mut tracker = self.tracker.lock();

		if !tracker.done.insert(result.request_id.clone()) {
			tracing::debug!(request_id = %result.request_id, "Ignoring repeated result.");

			return None;
		}

		let reported_url = (!result.url.is_empty()).then(|| result.url.clone());
		let depth = tracker.depth(&result.request_id);
		let claim = match tracker.entries.get(&result.request_id) {
			Some(entry) => Claim {
				tracked: true,
				label: entry.label.clone(),
				url: entry.url.clone().or(reported_url),
				elapsed: Some(entry.started.elapsed()),
				depth,
			},
			None => Claim {
				tracked: false,
				label: result.label(),
				url: reported_url,
				elapsed: None,
				depth,
			},
		};

		Some(claim)
	}

	fn redirect_target(&self, result: &QueryResult, claim: &Claim) -> Option<String> {
		let location = result.query_status.redirect_location()?;
		let source = claim.url.as_deref().and_then(|url| Url::parse(url).ok());
		let target = match (Url::parse(location), &source) {
			(Ok(target), _) => target,
			(Err(_), Some(source)) => source.join(location).ok()?,
			(Err(e), None) => {
				tracing::warn!(%location, error = %e, "Cannot resolve redirect location.");

				return None;
			},
		};

		if source.as_ref() == Some(&target) {
			tracing::info!(
				request_id = %result.request_id,
				%location,
				"Not following redirect to the same URL."
			);

			return None;
		}
		if !self.follow_redirects {
			tracing::debug!(
				request_id = %result.request_id,
				%location,
				"Redirect following is disabled."
			);

			return None;
		}
		if claim.depth >= self.redirect_limit {
			tracing::warn!(
				request_id = %result.request_id,
				limit = self.redirect_limit,
				"Redirect limit reached; not following."
			);

			return None;
		}

		Some(if Url::parse(location).is_ok() { location.to_owned() } else { target.into() })
	}

	async fn follow(&self, parent: &str, target: String) -> PendingSet {
		let request = QueryRequest { url: vec![target], ..self.template.clone() };
		let ctx = self.ctx.fork();

		match self.transport.query(&ctx, &request).await {
			Ok(reply) => {
				self.echo_trace(&ctx);

				self.record_reply(&request, &reply, Some(parent))
			},
			Err(e) => {
				tracing::warn!(%parent, error = %e, "Redirect query failed.");
				self.presenter.present(Event::Message(format!(
					"Redirect query for {} failed: {e}",
					request.url.join(", ")
				)));

				PendingSet::new()
			},
		}
	}
}
impl ResultHandler for QueryHandler {
	fn handle<'a>(&'a self, _ctx: &'a CallContext, result: QueryResult) -> HandlerFuture<'a> {
		Box::pin(async move {
			if !result.is_complete() {
				tracing::debug!(request_id = %result.request_id, "Result not complete yet.");

				return PendingSet::new();
			}

			let Some(claim) = self.claim(&result) else {
				return PendingSet::new();
			};
			let target = self.redirect_target(&result, &claim);
			let request_id = result.request_id.clone();

			self.presenter.present(Event::Result {
				label: claim.label.clone(),
				elapsed: claim.elapsed,
				redirect_depth: claim.depth,
				result: Box::new(result),
			});

			let spawned = match target {
				Some(target) => self.follow(&request_id, target).await,
				None => PendingSet::new(),
			};

			if claim.tracked {
				self.wait_group.done();
			}

			spawned
		})
	}
}
impl Debug for QueryHandler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("QueryHandler")
			.field("follow_redirects", &self.follow_redirects)
			.field("redirect_limit", &self.redirect_limit)
			.field("outstanding", &self.wait_group.count())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		model::{DatasetType, QueryReplyEntry, Status},
		present::RecordingPresenter,
	};

	fn handler(transport: Arc<ScriptedTransport>) -> (QueryHandler, Arc<RecordingPresenter>) {
		let presenter = Arc::new(RecordingPresenter::default());
		let template = QueryRequest::new([DatasetType::Categorization]);

		(QueryHandler::new(transport, presenter.clone(), &template), presenter)
	}

	#[test]
	fn reply_entries_match_targets_in_order() {
		let (handler, presenter) = handler(Arc::default());
		let request = QueryRequest::new([DatasetType::Categorization])
			.with_urls(["http://a"])
			.with_contents(["body".to_owned()]);
		let reply = QueryReply {
			reply: vec![
				QueryReplyEntry::rejected(Status::new(3, "bad url")),
				QueryReplyEntry::accepted("R2"),
			],
		};
		let pending = handler.record_reply(&request, &reply, None);

		assert_eq!(pending.into_iter().collect::<Vec<_>>(), [("R2".to_owned(), "body".to_owned())]);
		assert_eq!(handler.outstanding(), 1);
		assert_eq!(presenter.events(), [
			Event::ReplyError { label: "http://a".into(), error: Status::new(3, "bad url") },
			Event::Reply { label: "body".into(), request_id: "R2".into() },
		]);
	}

	#[tokio::test]
	async fn repeated_results_release_once() {
		let (handler, presenter) = handler(Arc::default());

		handler.track("R1", "http://a", Some("http://a".into()), None);
		handler.track("R2", "http://b", Some("http://b".into()), None);

		let ctx = CallContext::default();

		handler.handle(&ctx, completed("R1")).await;
		handler.handle(&ctx, completed("R1")).await;

		assert_eq!(handler.outstanding(), 1);
		assert_eq!(presenter.results().len(), 1);
	}

	#[tokio::test]
	async fn same_url_redirect_is_not_followed() {
		let transport = Arc::new(ScriptedTransport::default());
		let (handler, _) = handler(transport.clone());

		handler.track("R1", "http://src", Some("http://src".into()), None);

		let spawned =
			handler.handle(&CallContext::default(), redirected("R1", "http://src/")).await;

		assert!(spawned.is_empty());
		assert!(transport.queries().is_empty());
		assert_eq!(handler.outstanding(), 0);
	}

	#[tokio::test]
	async fn relative_redirect_resolves_against_source() {
		let transport = Arc::new(ScriptedTransport::default().with_reply("http://src/next", "R2"));
		let (handler, _) = handler(transport.clone());

		handler.track("R1", "http://src/start", Some("http://src/start".into()), None);

		let spawned = handler.handle(&CallContext::default(), redirected("R1", "next")).await;

		assert_eq!(spawned.keys().collect::<Vec<_>>(), ["R2"]);
		assert_eq!(handler.redirect_depth("R2"), 1);
		assert_eq!(handler.outstanding(), 1);
	}

	#[tokio::test]
	async fn redirect_limit_stops_the_chain() {
		let transport = Arc::new(ScriptedTransport::default().with_reply("http://dst", "R2"));
		let presenter = Arc::new(RecordingPresenter::default());
		let template = QueryRequest::new([DatasetType::Categorization]);
		let handler =
			QueryHandler::new(transport.clone(), presenter, &template).with_redirects(true, 0);

		handler.track("R1", "http://src", Some("http://src".into()), None);

		let spawned = handler.handle(&CallContext::default(), redirected("R1", "http://dst")).await;

		assert!(spawned.is_empty());
		assert!(transport.queries().is_empty());
	}
}
