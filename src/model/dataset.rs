//! Dataset kinds and the per-request response dataset.

// self
use crate::{
	_prelude::*,
	error::InputError,
	model::{Category, Status, Verdict},
};

/// Facet of analysis the service can produce for a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DatasetType {
	/// Category tags.
	Categorization,
	/// Malicious verdict plus malicious categories.
	Malicious,
	/// Echo of the submitted URL; a debugging aid.
	Echo,
	/// Detected language.
	Language,
}
impl DatasetType {
	const ALL: [DatasetType; 4] = [
		DatasetType::Categorization,
		DatasetType::Malicious,
		DatasetType::Echo,
		DatasetType::Language,
	];

	/// Kinds offered to users; `echo` is internal and left out.
	pub fn available() -> impl Iterator<Item = DatasetType> {
		Self::ALL.into_iter().filter(|kind| *kind != DatasetType::Echo)
	}

	/// Numeric wire ID.
	pub const fn id(self) -> i32 {
		match self {
			DatasetType::Categorization => 0,
			DatasetType::Malicious => 1,
			DatasetType::Echo => 2,
			DatasetType::Language => 3,
		}
	}

	/// Looks a kind up by numeric wire ID.
	pub const fn from_id(id: i32) -> Option<Self> {
		match id {
			0 => Some(DatasetType::Categorization),
			1 => Some(DatasetType::Malicious),
			2 => Some(DatasetType::Echo),
			3 => Some(DatasetType::Language),
			_ => None,
		}
	}

	/// Lowercase name used on the command line.
	pub const fn as_str(self) -> &'static str {
		match self {
			DatasetType::Categorization => "categorization",
			DatasetType::Malicious => "malicious",
			DatasetType::Echo => "echo",
			DatasetType::Language => "language",
		}
	}
}
impl Display for DatasetType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for DatasetType {
	type Err = InputError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let wanted = s.trim();

		Self::ALL
			.into_iter()
			.find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
			.ok_or_else(|| InputError::UnknownDataset { value: s.to_owned() })
	}
}

/// Category tags for a request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categorization {
	/// Assigned categories.
	#[serde(default)]
	pub value: Vec<Category>,
	/// Dataset-level error.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<Status>,
}

/// Malicious verdict for a request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Malicious {
	/// Verdict.
	#[serde(default)]
	pub verdict: Verdict,
	/// Malicious categories backing the verdict.
	#[serde(default)]
	pub category: Vec<Category>,
	/// Dataset-level error.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<Status>,
}

/// Echo of the submitted URL.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Echo {
	/// Echoed URL.
	#[serde(default)]
	pub url: String,
	/// Dataset-level error.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<Status>,
}

/// Detected language.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
	/// ISO language code.
	#[serde(default)]
	pub code: String,
	/// Dataset-level error.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<Status>,
}

/// Response dataset: any subset of the dataset kinds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
	/// Category tags.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub categorization: Option<Categorization>,
	/// Malicious verdict.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub malicious: Option<Malicious>,
	/// URL echo.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub echo: Option<Echo>,
	/// Language.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub language: Option<Language>,
}
impl Dataset {
	/// Returns true when no dataset kind is present.
	pub fn is_empty(&self) -> bool {
		self.categorization.is_none()
			&& self.malicious.is_none()
			&& self.echo.is_none()
			&& self.language.is_none()
	}

	/// Merges `other` into `self`; each field present in `other` replaces the one in `self`.
	pub fn merge(mut self, other: Dataset) -> Dataset {
		if other.categorization.is_some() {
			self.categorization = other.categorization;
		}
		if other.malicious.is_some() {
			self.malicious = other.malicious;
		}
		if other.echo.is_some() {
			self.echo = other.echo;
		}
		if other.language.is_some() {
			self.language = other.language;
		}

		self
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn categorized(categories: &[Category]) -> Dataset {
		Dataset {
			categorization: Some(Categorization { value: categories.to_vec(), error: None }),
			..Default::default()
		}
	}

	#[test]
	fn available_excludes_echo() {
		let kinds = DatasetType::available().collect::<Vec<_>>();

		assert_eq!(
			kinds,
			[DatasetType::Categorization, DatasetType::Malicious, DatasetType::Language]
		);
		assert_eq!("ECHO".parse::<DatasetType>().ok(), Some(DatasetType::Echo));
		assert!("colour".parse::<DatasetType>().is_err());
	}

	#[test]
	fn merge_with_empty_is_identity() {
		let dataset = categorized(&[Category::Blog]);

		assert_eq!(dataset.clone().merge(Dataset::default()), dataset);
		assert_eq!(Dataset::default().merge(dataset.clone()), dataset);
		assert!(Dataset::default().is_empty());
	}

	#[test]
	fn merge_is_right_biased_per_field() {
		let left = Dataset {
			language: Some(Language { code: "en".into(), error: None }),
			..categorized(&[Category::Blog])
		};
		let merged = left.merge(categorized(&[Category::News]));

		assert_eq!(merged.categorization, categorized(&[Category::News]).categorization);
		assert_eq!(merged.language.map(|language| language.code).as_deref(), Some("en"));
	}

	#[test]
	fn decodes_sparse_json() {
		let dataset: Dataset = serde_json::from_value(serde_json::json!({
			"categorization": { "value": ["BLOG"] },
			"malicious": { "verdict": "CLEAN" }
		}))
		.expect("Sparse dataset should deserialize.");

		assert_eq!(dataset.categorization.map(|c| c.value), Some(vec![Category::Blog]));
		assert_eq!(dataset.malicious.map(|m| m.verdict), Some(Verdict::Clean));
		assert!(dataset.echo.is_none());
	}
}
