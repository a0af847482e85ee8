//! Query submission, reply, and result messages.

// self
use crate::{
	_prelude::*,
	error::InputError,
	model::{Dataset, DatasetType, Status},
};

const CONTENT_LABEL_CHARS: usize = 32;

/// Prepends `http://` to values that carry no scheme.
pub fn normalize_url(raw: &str) -> String {
	let trimmed = raw.trim();

	if trimmed.contains("://") { trimmed.to_owned() } else { format!("http://{trimmed}") }
}

/// Short display label for a content blob.
pub fn content_label(content: &str) -> String {
	let flattened = content.split_whitespace().collect::<Vec<_>>().join(" ");

	if flattened.chars().count() <= CONTENT_LABEL_CHARS {
		flattened
	} else {
		let prefix = flattened.chars().take(CONTENT_LABEL_CHARS).collect::<String>();

		format!("{prefix}...")
	}
}

/// A submission of URLs and/or content for analysis.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
	/// URLs to analyze.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub url: Vec<String>,
	/// Raw content bodies to analyze.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub content: Vec<String>,
	/// Requested dataset kinds.
	#[serde(default)]
	pub dataset: Vec<DatasetType>,
	/// Callback URL the service posts results to.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub callback: String,
	/// Dataset values already known to the caller.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hint: Option<Dataset>,
}
impl QueryRequest {
	/// Starts a request for `datasets`.
	pub fn new(datasets: impl IntoIterator<Item = DatasetType>) -> Self {
		let mut dataset = Vec::new();

		for kind in datasets {
			if !dataset.contains(&kind) {
				dataset.push(kind);
			}
		}

		Self { dataset, ..Default::default() }
	}

	/// Adds URLs, normalizing scheme-less values to `http://`.
	pub fn with_urls<I, S>(mut self, urls: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		self.url.extend(urls.into_iter().map(|url| normalize_url(url.as_ref())));

		self
	}

	/// Adds resolved content bodies.
	pub fn with_contents<I>(mut self, contents: I) -> Self
	where
		I: IntoIterator<Item = String>,
	{
		self.content.extend(contents);

		self
	}

	/// Sets the callback URL, normalizing a missing scheme to `http://`.
	pub fn with_callback(mut self, callback: &str) -> Self {
		self.callback = normalize_url(callback);

		self
	}

	/// Sets dataset hints.
	pub fn with_hint(mut self, hint: Dataset) -> Self {
		self.hint = Some(hint);

		self
	}

	/// Checks the request before anything is sent.
	pub fn validate(&self) -> Result<(), InputError> {
		if self.url.is_empty() && self.content.is_empty() {
			return Err(InputError::NoTargets);
		}
		if self.dataset.is_empty() {
			return Err(InputError::NoDatasets);
		}
		if self.content.iter().any(String::is_empty) {
			return Err(InputError::EmptyContent);
		}

		let urls = self.url.iter().chain((!self.callback.is_empty()).then_some(&self.callback));

		for url in urls {
			Url::parse(url)
				.map_err(|source| InputError::InvalidUrl { value: url.to_owned(), source })?;
		}

		Ok(())
	}

	/// Display labels in submission order: URLs first, then contents.
	pub fn labels(&self) -> impl Iterator<Item = String> + '_ {
		self.url.iter().cloned().chain(self.content.iter().map(|content| content_label(content)))
	}

	/// Number of submitted targets.
	pub fn target_count(&self) -> usize {
		self.url.len() + self.content.len()
	}
}

/// One entry of a [`QueryReply`], matching a submitted target by position.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryReplyEntry {
	/// Request ID assigned by the service; empty when `error` is set.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub request_id: String,
	/// Per-entry rejection.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<Status>,
}
impl QueryReplyEntry {
	/// Successful entry.
	pub fn accepted(request_id: impl Into<String>) -> Self {
		Self { request_id: request_id.into(), error: None }
	}

	/// Rejected entry.
	pub fn rejected(error: Status) -> Self {
		Self { request_id: String::new(), error: Some(error) }
	}
}

/// Service reply to a [`QueryRequest`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryReply {
	/// One entry per submitted target: URLs first, then contents.
	#[serde(default)]
	pub reply: Vec<QueryReplyEntry>,
}

/// Progress of a single request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatus {
	/// Whether the service has finished with the request.
	#[serde(default)]
	pub complete: bool,
	/// HTTP-like status of the fetch of the target URL.
	#[serde(default)]
	pub fetch_code: i32,
	/// Redirect location reported by the fetch.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub location: String,
	/// Request-level error.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<Status>,
}
impl QueryStatus {
	/// Location to follow when the fetch ended in a redirect.
	pub fn redirect_location(&self) -> Option<&str> {
		((300..=399).contains(&self.fetch_code) && !self.location.is_empty())
			.then_some(self.location.as_str())
	}
}

/// Evolving state of one request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
	/// Request ID.
	#[serde(default)]
	pub request_id: String,
	/// URL that was analyzed.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub url: String,
	/// Synopsis of analyzed content.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub content: String,
	/// Datasets produced so far.
	#[serde(default)]
	pub response_dataset: Dataset,
	/// Completion status.
	#[serde(default)]
	pub query_status: QueryStatus,
}
impl QueryResult {
	/// A result is complete once it carries an error or the complete flag.
	pub fn is_complete(&self) -> bool {
		self.query_status.error.is_some() || self.query_status.complete
	}

	/// URL, or a label for the content.
	pub fn label(&self) -> String {
		if self.url.is_empty() { content_label(&self.content) } else { self.url.clone() }
	}
}

/// Categorization correction submitted by a user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestRequest {
	/// URL the suggestion concerns.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub url: String,
	/// Content the suggestion concerns.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub content: String,
	/// Suggested dataset values.
	#[serde(default)]
	pub dataset: Dataset,
}
impl SuggestRequest {
	/// Checks that a target and at least one dataset value are present.
	pub fn validate(&self) -> Result<(), InputError> {
		if self.url.is_empty() && self.content.is_empty() {
			return Err(InputError::NoTargets);
		}
		if self.dataset.is_empty() {
			return Err(InputError::EmptySuggestion);
		}
		if !self.url.is_empty() {
			Url::parse(&self.url)
				.map_err(|source| InputError::InvalidUrl { value: self.url.clone(), source })?;
		}

		Ok(())
	}
}

/// Free-form GraphQL document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQlRequest {
	/// Query document.
	pub query: String,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::model::{Categorization, Category};

	#[test]
	fn scheme_less_urls_become_http() {
		assert_eq!(normalize_url("example.com"), "http://example.com");
		assert_eq!(normalize_url(" https://example.com/a "), "https://example.com/a");
	}

	#[test]
	fn validate_rejects_empty_requests() {
		assert!(matches!(
			QueryRequest::new([DatasetType::Categorization]).validate(),
			Err(InputError::NoTargets)
		));
		assert!(matches!(
			QueryRequest::new([]).with_urls(["example.com"]).validate(),
			Err(InputError::NoDatasets)
		));
		assert!(matches!(
			QueryRequest::new([DatasetType::Language]).with_contents([String::new()]).validate(),
			Err(InputError::EmptyContent)
		));
		assert!(matches!(
			QueryRequest::new([DatasetType::Language]).with_urls(["http://[bad"]).validate(),
			Err(InputError::InvalidUrl { .. })
		));
	}

	#[test]
	fn request_deduplicates_datasets_and_labels_in_order() {
		let request = QueryRequest::new([DatasetType::Malicious, DatasetType::Malicious])
			.with_urls(["a.example", "http://b.example"])
			.with_contents(["x".repeat(40)])
			.with_callback("pub.example/cb");

		assert!(request.validate().is_ok());
		assert_eq!(request.dataset, [DatasetType::Malicious]);
		assert_eq!(request.callback, "http://pub.example/cb");
		assert_eq!(request.target_count(), 3);
		assert_eq!(
			request.labels().collect::<Vec<_>>(),
			[
				"http://a.example".to_owned(),
				"http://b.example".into(),
				format!("{}...", "x".repeat(32)),
			]
		);
	}

	#[test]
	fn completion_predicate() {
		let mut result = QueryResult::default();

		assert!(!result.is_complete());

		result.query_status.error = Some(Status::new(5, "not found"));

		assert!(result.is_complete());

		result.query_status = QueryStatus { complete: true, ..Default::default() };

		assert!(result.is_complete());
	}

	#[test]
	fn redirect_location_requires_3xx_and_location() {
		let redirect = QueryStatus {
			complete: true,
			fetch_code: 301,
			location: "http://dst".into(),
			error: None,
		};

		assert_eq!(redirect.redirect_location(), Some("http://dst"));
		assert_eq!(QueryStatus { fetch_code: 200, ..redirect.clone() }.redirect_location(), None);
		assert_eq!(QueryStatus { location: String::new(), ..redirect }.redirect_location(), None);
	}

	#[test]
	fn result_decodes_service_json() {
		let result: QueryResult = serde_json::from_value(serde_json::json!({
			"request_id": "R1",
			"url": "http://example.com",
			"response_dataset": { "categorization": { "value": ["BLOG"] } },
			"query_status": { "complete": true, "fetch_code": 200 }
		}))
		.expect("Result JSON should deserialize.");

		assert!(result.is_complete());
		assert_eq!(
			result.response_dataset.categorization,
			Some(Categorization { value: vec![Category::Blog], error: None })
		);
	}

	#[test]
	fn suggestion_requires_values() {
		let mut suggestion =
			SuggestRequest { url: "http://example.com".into(), ..Default::default() };

		assert!(matches!(suggestion.validate(), Err(InputError::EmptySuggestion)));

		suggestion.dataset.categorization =
			Some(Categorization { value: vec![Category::News], error: None });

		assert!(suggestion.validate().is_ok());
	}
}
