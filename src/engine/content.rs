//! Resolution of user-supplied content values.

// crates.io
use tokio::io::AsyncReadExt;
// self
use crate::{_prelude::*, error::InputError};

const STDIN_MARKER: &str = "-";

/// Where a content value comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentSource {
	/// The value itself.
	Literal(String),
	/// A file named after `@`.
	File(String),
	/// Standard input (`@-`).
	Stdin,
}
impl FromStr for ContentSource {
	type Err = InputError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.strip_prefix('@') {
			_ if s.is_empty() => Err(InputError::EmptyContent),
			Some("") => Err(InputError::BareContentReference),
			Some(STDIN_MARKER) => Ok(Self::Stdin),
			Some(path) => Ok(Self::File(path.to_owned())),
			None => Ok(Self::Literal(s.to_owned())),
		}
	}
}
impl ContentSource {
	/// Reads the content.
	pub async fn read(self) -> Result<String, InputError> {
		let content = match self {
			Self::Literal(content) => content,
			Self::File(path) => tokio::fs::read_to_string(&path)
				.await
				.map_err(|source| InputError::ReadContent { path, source })?,
			Self::Stdin => {
				let mut content = String::new();

				tokio::io::stdin().read_to_string(&mut content).await.map_err(|source| {
					InputError::ReadContent { path: STDIN_MARKER.into(), source }
				})?;

				content
			},
		};

		if content.is_empty() {
			return Err(InputError::EmptyContent);
		}

		Ok(content)
	}
}

/// Parses every value first, then reads them in order.
pub async fn resolve_contents<I, S>(values: I) -> Result<Vec<String>, InputError>
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let sources = values
		.into_iter()
		.map(|value| value.as_ref().parse::<ContentSource>())
		.collect::<Result<Vec<_>, _>>()?;
	let mut contents = Vec::with_capacity(sources.len());

	for source in sources {
		contents.push(source.read().await?);
	}

	Ok(contents)
}

#[cfg(test)]
mod tests {
	// std
	use std::io::Write;
	// self
	use super::*;

	#[test]
	fn parses_every_form() {
		let parse = |raw: &str| raw.parse::<ContentSource>().ok();

		assert_eq!(parse("hello"), Some(ContentSource::Literal("hello".into())));
		assert_eq!(parse("@-"), Some(ContentSource::Stdin));
		assert_eq!(parse("@a.txt"), Some(ContentSource::File("a.txt".into())));
		assert!(matches!("@".parse::<ContentSource>(), Err(InputError::BareContentReference)));
		assert!(matches!("".parse::<ContentSource>(), Err(InputError::EmptyContent)));
	}

	#[tokio::test]
	async fn invalid_values_fail_before_any_read() {
		let err = resolve_contents(["@/definitely/missing/file", "@"])
			.await
			.expect_err("Bare reference should be rejected.");

		assert!(matches!(err, InputError::BareContentReference));
	}

	#[tokio::test]
	async fn reads_files_and_literals() {
		let mut file = tempfile::NamedTempFile::new().expect("Temp file should be created.");

		file.write_all(b"<html>body</html>").expect("Temp file should be writable.");

		let reference = format!("@{}", file.path().display());
		let contents = resolve_contents(["literal", reference.as_str()])
			.await
			.expect("Contents should resolve.");

		assert_eq!(contents, ["literal", "<html>body</html>"]);
	}

	#[tokio::test]
	async fn missing_file_reports_path() {
		let err = resolve_contents(["@/definitely/missing/file"])
			.await
			.expect_err("Missing file should fail.");

		assert!(matches!(
			err,
			InputError::ReadContent { path, .. } if path == "/definitely/missing/file"
		));
	}
}
