//! Plain-text rendering of engine events.
//!
//! The engine and the command handlers emit [`Event`]s; a [`Presenter`] decides where they go.
//! [`TextPresenter`] writes results to stdout and diagnostics to stderr, while
//! [`RecordingPresenter`] keeps the events for inspection.

// std
use std::io::{self, Write as _};
// self
use crate::{
	_prelude::*,
	model::{Category, QueryResult, Status},
};

/// Something worth showing the user.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
	/// The service accepted a target.
	Reply {
		/// URL or content label.
		label: String,
		/// Assigned request ID.
		request_id: String,
	},
	/// The service rejected a target.
	ReplyError {
		/// URL or content label.
		label: String,
		/// Rejection status.
		error: Status,
	},
	/// A complete result.
	Result {
		/// URL or content label.
		label: String,
		/// Time since the request was submitted, when known.
		elapsed: Option<std::time::Duration>,
		/// Number of redirect hops behind this request.
		redirect_depth: usize,
		/// The result itself.
		result: Box<QueryResult>,
	},
	/// A redirect was followed with a new request.
	Redirect {
		/// Request that reported the redirect.
		from_request_id: String,
		/// Redirect destination.
		location: String,
		/// Request ID for the destination.
		request_id: String,
		/// Hop count of the new request.
		depth: usize,
	},
	/// Service-side trace identifier.
	ServiceTrace {
		/// Trace ID prefix.
		trace_id: String,
	},
	/// Free-form message.
	Message(String),
}
impl Event {
	/// Trace event for an `uber-trace-id` value, keeping the part before the first `:`.
	pub fn service_trace(raw: &str) -> Self {
		let trace_id = raw.split(':').next().unwrap_or(raw).to_owned();

		Self::ServiceTrace { trace_id }
	}

	/// Whether the event belongs on the diagnostic stream.
	pub fn is_diagnostic(&self) -> bool {
		matches!(self, Self::ServiceTrace { .. } | Self::Redirect { .. })
	}
}

/// Receives engine events.
pub trait Presenter
where
	Self: Send + Sync,
{
	/// Shows one event.
	fn present(&self, event: Event);
}

/// Writes human-readable text to stdout and stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextPresenter;
impl Presenter for TextPresenter {
	fn present(&self, event: Event) {
		let text = render(&event);
		let written = if event.is_diagnostic() {
			io::stderr().lock().write_all(text.as_bytes())
		} else {
			io::stdout().lock().write_all(text.as_bytes())
		};

		if let Err(e) = written {
			tracing::warn!(error = %e, "Unable to write output.");
		}
	}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
	events: Mutex<Vec<Event>>,
}
impl RecordingPresenter {
	/// Snapshot of the recorded events.
	pub fn events(&self) -> Vec<Event> {
		self.events.lock().clone()
	}

	/// Recorded complete results.
	pub fn results(&self) -> Vec<QueryResult> {
		self.events
			.lock()
			.iter()
			.filter_map(|event| match event {
				Event::Result { result, .. } => Some(result.as_ref().clone()),
				_ => None,
			})
			.collect()
	}
}
impl Presenter for RecordingPresenter {
	fn present(&self, event: Event) {
		self.events.lock().push(event);
	}
}

/// Renders an event as text, including the trailing newline.
pub fn render(event: &Event) -> String {
	match event {
		Event::Reply { label, request_id } =>
			format!("URL/Content: {label}\tRequest ID: {request_id}\n"),
		Event::ReplyError { label, error } => format!("URL/Content: {label}\tError: {error}\n"),
		Event::Result { label, elapsed, redirect_depth, result } =>
			render_result(label, *elapsed, *redirect_depth, result),
		Event::Redirect { from_request_id, location, request_id, depth } => format!(
			"Redirect {depth}: {from_request_id} -> {location} (Request ID: {request_id})\n"
		),
		Event::ServiceTrace { trace_id } => format!("Trace ID: {trace_id}\n"),
		Event::Message(message) => format!("{message}\n"),
	}
}

fn render_result(
	label: &str,
	elapsed: Option<std::time::Duration>,
	redirect_depth: usize,
	result: &QueryResult,
) -> String {
	let status = &result.query_status;
	let dataset = &result.response_dataset;
	let join = |values: &[Category]| {
		values.iter().map(|value| value.as_str()).collect::<Vec<_>>().join(", ")
	};
	let mut lines = vec![
		String::new(),
		format!("URL/Content: {label}"),
		format!("Request ID: {}", result.request_id),
	];

	if let Some(elapsed) = elapsed {
		lines.push(format!("Elapsed: {elapsed:?}"));
	}

	lines.push(format!("Complete: {}", status.complete));

	if status.fetch_code != 0 {
		lines.push(format!("Fetch Code: {}", status.fetch_code));
	}
	if !status.location.is_empty() {
		lines.push(format!("Location: {}", status.location));
	}
	if redirect_depth > 0 {
		lines.push(format!("Redirect Depth: {redirect_depth}"));
	}
	if let Some(error) = &status.error {
		lines.push(format!("Error: {error}"));
	}
	if let Some(categorization) = &dataset.categorization {
		lines.push(match &categorization.error {
			Some(error) => format!("Categories Error: {error}"),
			None => format!("Categories: {}", join(&categorization.value)),
		});
	}
	if let Some(malicious) = &dataset.malicious {
		lines.push(match &malicious.error {
			Some(error) => format!("Malicious Error: {error}"),
			None if malicious.category.is_empty() => format!("Malicious: {}", malicious.verdict),
			None => format!("Malicious: {} ({})", malicious.verdict, join(&malicious.category)),
		});
	}
	if let Some(language) = &dataset.language {
		lines.push(match &language.error {
			Some(error) => format!("Language Error: {error}"),
			None => format!("Language: {}", language.code),
		});
	}
	if let Some(echo) = &dataset.echo {
		lines.push(format!("Echo: {}", echo.url));
	}

	lines.push(String::new());

	lines.join("\n")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::model::{Categorization, Malicious, QueryStatus, Verdict};

	#[test]
	fn result_block_lists_status_and_datasets() {
		let mut result = QueryResult {
			request_id: "R1".into(),
			url: "http://example.com".into(),
			query_status: QueryStatus { complete: true, fetch_code: 200, ..Default::default() },
			..Default::default()
		};

		result.response_dataset.categorization =
			Some(Categorization { value: vec![Category::Blog, Category::News], error: None });
		result.response_dataset.malicious =
			Some(Malicious { verdict: Verdict::Clean, category: Vec::new(), error: None });

		let text = render(&Event::Result {
			label: "http://example.com".into(),
			elapsed: None,
			redirect_depth: 1,
			result: Box::new(result),
		});

		assert!(text.contains("Request ID: R1\n"));
		assert!(text.contains("Complete: true\n"));
		assert!(text.contains("Fetch Code: 200\n"));
		assert!(text.contains("Redirect Depth: 1\n"));
		assert!(text.contains("Categories: BLOG, NEWS\n"));
		assert!(text.contains("Malicious: CLEAN\n"));
	}

	#[test]
	fn trace_keeps_prefix() {
		assert_eq!(
			Event::service_trace("abc123:def:0:1"),
			Event::ServiceTrace { trace_id: "abc123".into() }
		);
		assert!(Event::service_trace("abc").is_diagnostic());
	}

	#[test]
	fn recording_presenter_collects_results() {
		let presenter = RecordingPresenter::default();

		presenter.present(Event::Message("hello".into()));
		presenter.present(Event::Result {
			label: "x".into(),
			elapsed: None,
			redirect_depth: 0,
			result: Box::default(),
		});

		assert_eq!(presenter.events().len(), 2);
		assert_eq!(presenter.results().len(), 1);
	}
}
