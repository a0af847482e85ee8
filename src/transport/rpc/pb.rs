//! Protobuf messages of the `zvelo.msg` package and their conversions to the crate model.

// self
use crate::model::{
	self, Categorization, Category, DatasetType, Echo, Language, Malicious, Verdict,
};

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct Status {
	#[prost(int32, tag = "1")]
	pub code: i32,
	#[prost(string, tag = "2")]
	pub message: String,
}

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct CategorizationResult {
	#[prost(int32, repeated, tag = "1")]
	pub value: Vec<i32>,
	#[prost(message, optional, tag = "2")]
	pub error: Option<Status>,
}

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct MaliciousResult {
	#[prost(int32, tag = "1")]
	pub verdict: i32,
	#[prost(int32, repeated, tag = "2")]
	pub category: Vec<i32>,
	#[prost(message, optional, tag = "3")]
	pub error: Option<Status>,
}

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoResult {
	#[prost(string, tag = "1")]
	pub url: String,
	#[prost(message, optional, tag = "2")]
	pub error: Option<Status>,
}

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct LanguageResult {
	#[prost(string, tag = "1")]
	pub code: String,
	#[prost(message, optional, tag = "2")]
	pub error: Option<Status>,
}

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct DataSet {
	#[prost(message, optional, tag = "1")]
	pub categorization: Option<CategorizationResult>,
	#[prost(message, optional, tag = "2")]
	pub malicious: Option<MaliciousResult>,
	#[prost(message, optional, tag = "3")]
	pub echo: Option<EchoResult>,
	#[prost(message, optional, tag = "4")]
	pub language: Option<LanguageResult>,
}

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryRequests {
	#[prost(string, repeated, tag = "1")]
	pub url: Vec<String>,
	#[prost(string, repeated, tag = "2")]
	pub content: Vec<String>,
	#[prost(int32, repeated, tag = "3")]
	pub dataset: Vec<i32>,
	#[prost(string, tag = "4")]
	pub callback: String,
	#[prost(message, optional, tag = "5")]
	pub hint: Option<DataSet>,
}

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryReply {
	#[prost(string, tag = "1")]
	pub request_id: String,
	#[prost(message, optional, tag = "2")]
	pub error: Option<Status>,
}

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryReplies {
	#[prost(message, repeated, tag = "1")]
	pub reply: Vec<QueryReply>,
}

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestId {
	#[prost(string, tag = "1")]
	pub request_id: String,
}

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryStatus {
	#[prost(bool, tag = "1")]
	pub complete: bool,
	#[prost(int32, tag = "2")]
	pub fetch_code: i32,
	#[prost(string, tag = "3")]
	pub location: String,
	#[prost(message, optional, tag = "4")]
	pub error: Option<Status>,
}

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryResult {
	#[prost(string, tag = "1")]
	pub request_id: String,
	#[prost(string, tag = "2")]
	pub url: String,
	#[prost(string, tag = "3")]
	pub content: String,
	#[prost(message, optional, tag = "4")]
	pub response_dataset: Option<DataSet>,
	#[prost(message, optional, tag = "5")]
	pub query_status: Option<QueryStatus>,
}

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct Suggestion {
	#[prost(string, tag = "1")]
	pub url: String,
	#[prost(string, tag = "2")]
	pub content: String,
	#[prost(message, optional, tag = "3")]
	pub dataset: Option<DataSet>,
}

#[allow(missing_docs)]
#[derive(Clone, PartialEq, prost::Message)]
pub struct Empty {}

fn categories(ids: Vec<i32>) -> Vec<Category> {
	ids.into_iter().map(|id| Category::from_id(id).unwrap_or(Category::Unknown)).collect()
}

fn category_ids(categories: Vec<Category>) -> Vec<i32> {
	categories.into_iter().map(Category::id).collect()
}

impl From<Status> for model::Status {
	fn from(status: Status) -> Self {
		Self { code: status.code, message: status.message }
	}
}
impl From<model::Status> for Status {
	fn from(status: model::Status) -> Self {
		Self { code: status.code, message: status.message }
	}
}

impl From<DataSet> for model::Dataset {
	fn from(dataset: DataSet) -> Self {
		Self {
			categorization: dataset.categorization.map(|value| Categorization {
				value: categories(value.value),
				error: value.error.map(Into::into),
			}),
			malicious: dataset.malicious.map(|value| Malicious {
				verdict: Verdict::from_id(value.verdict),
				category: categories(value.category),
				error: value.error.map(Into::into),
			}),
			echo: dataset
				.echo
				.map(|value| Echo { url: value.url, error: value.error.map(Into::into) }),
			language: dataset
				.language
				.map(|value| Language { code: value.code, error: value.error.map(Into::into) }),
		}
	}
}
impl From<model::Dataset> for DataSet {
	fn from(dataset: model::Dataset) -> Self {
		Self {
			categorization: dataset.categorization.map(|value| CategorizationResult {
				value: category_ids(value.value),
				error: value.error.map(Into::into),
			}),
			malicious: dataset.malicious.map(|value| MaliciousResult {
				verdict: value.verdict.id(),
				category: category_ids(value.category),
				error: value.error.map(Into::into),
			}),
			echo: dataset
				.echo
				.map(|value| EchoResult { url: value.url, error: value.error.map(Into::into) }),
			language: dataset
				.language
				.map(|value| LanguageResult {
					code: value.code,
					error: value.error.map(Into::into),
				}),
		}
	}
}

impl From<&model::QueryRequest> for QueryRequests {
	fn from(request: &model::QueryRequest) -> Self {
		Self {
			url: request.url.clone(),
			content: request.content.clone(),
			dataset: request.dataset.iter().copied().map(DatasetType::id).collect(),
			callback: request.callback.clone(),
			hint: request.hint.clone().map(Into::into),
		}
	}
}

impl From<QueryReplies> for model::QueryReply {
	fn from(replies: QueryReplies) -> Self {
		Self {
			reply: replies
				.reply
				.into_iter()
				.map(|entry| model::QueryReplyEntry {
					request_id: entry.request_id,
					error: entry.error.map(Into::into),
				})
				.collect(),
		}
	}
}

impl From<QueryResult> for model::QueryResult {
	fn from(result: QueryResult) -> Self {
		let status = result.query_status.unwrap_or_default();

		Self {
			request_id: result.request_id,
			url: result.url,
			content: result.content,
			response_dataset: result.response_dataset.map(Into::into).unwrap_or_default(),
			query_status: model::QueryStatus {
				complete: status.complete,
				fetch_code: status.fetch_code,
				location: status.location,
				error: status.error.map(Into::into),
			},
		}
	}
}

impl From<&model::SuggestRequest> for Suggestion {
	fn from(request: &model::SuggestRequest) -> Self {
		Self {
			url: request.url.clone(),
			content: request.content.clone(),
			dataset: Some(request.dataset.clone().into()),
		}
	}
}
