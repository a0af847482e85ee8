//! On-disk layout, private file writes, and key-set caches.
//!
//! Everything the client persists lives under one [`DataDir`]: `token_<hex>.json` files written
//! by [`FileTokenCache`](crate::auth::FileTokenCache) and `key_<hex>.json` files written by
//! [`FileKeyCache`]. Files are created with mode `0600` inside a `0700` directory and replaced
//! atomically.

pub mod file;
pub mod memory;

pub use file::FileKeyCache;
pub use memory::MemoryKeyCache;

// std
use std::{
	ffi::OsString,
	fs::{self, File, OpenOptions},
	io::Write,
	path::{Path, PathBuf},
};
// crates.io
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	error::ConfigError,
	httpsig::JwkSet,
};

/// Future returned by cache backends.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Best-effort cache of JWK sets keyed by key ID.
pub trait KeyCache
where
	Self: Send + Sync,
{
	/// Returns the cached set for `key_id`, if any.
	fn get<'a>(&'a self, key_id: &'a str) -> StoreFuture<'a, Option<JwkSet>>;

	/// Stores `keys` under `key_id`, replacing any previous entry.
	fn set<'a>(&'a self, key_id: &'a str, keys: &'a JwkSet) -> StoreFuture<'a, ()>;
}

/// Error type produced by cache backends.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Per-application data directory, `<base>/<app>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataDir {
	root: PathBuf,
}
impl DataDir {
	/// Uses `<base>/<app>`.
	pub fn new(base: impl AsRef<Path>, app: &str) -> Self {
		Self { root: base.as_ref().join(app) }
	}

	/// Resolves the base from `explicit`, else `$XDG_DATA_HOME`, else `~/.local/share`.
	pub fn discover(app: &str, explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
		Self::resolve(app, explicit, std::env::var_os("XDG_DATA_HOME"), home::home_dir())
	}

	fn resolve(
		app: &str,
		explicit: Option<PathBuf>,
		xdg_data_home: Option<OsString>,
		home: Option<PathBuf>,
	) -> Result<Self, ConfigError> {
		let base = explicit
			.or_else(|| xdg_data_home.filter(|value| !value.is_empty()).map(PathBuf::from))
			.or_else(|| home.map(|home| home.join(".local").join("share")))
			.ok_or(ConfigError::MissingDataDir)?;

		Ok(Self::new(base, app))
	}

	/// Directory holding every persisted file.
	pub fn path(&self) -> &Path {
		&self.root
	}

	/// Token cache file for `name` and `scope`.
	pub fn token_path(&self, name: &str, scope: &ScopeSet) -> PathBuf {
		self.root.join(format!("token_{}.json", scope.cache_digest(name)))
	}

	/// Key cache file for `key_id`.
	pub fn key_path(&self, key_id: &str) -> PathBuf {
		self.root.join(format!("key_{}.json", hex::encode(Sha256::digest(key_id.as_bytes()))))
	}
}

/// Serializes `value` and atomically replaces `path` with a `0600` file.
pub(crate) fn write_private_json<T>(path: &Path, value: &T) -> Result<(), StoreError>
where
	T: ?Sized + Serialize,
{
	let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization {
		message: format!("Failed to serialize {}: {e}", path.display()),
	})?;

	write_private(path, &bytes)
}

/// Reads and parses `path`; a missing file yields `None`.
pub(crate) fn read_json<T>(path: &Path) -> Result<Option<T>, StoreError>
where
	T: serde::de::DeserializeOwned,
{
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(e) =>
			return Err(StoreError::Backend {
				message: format!("Failed to read {}: {e}", path.display()),
			}),
	};

	serde_json::from_slice(&bytes).map(Some).map_err(|e| StoreError::Serialization {
		message: format!("Failed to parse {}: {e}", path.display()),
	})
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		create_private_dir(parent)?;
	}

	let mut tmp_path = path.to_path_buf();

	tmp_path.set_extension(format!("tmp{}", std::process::id()));

	{
		let mut file = open_private(&tmp_path).map_err(|e| StoreError::Backend {
			message: format!("Failed to create {}: {e}", tmp_path.display()),
		})?;

		file.write_all(bytes).map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", tmp_path.display()),
		})?;
		file.sync_all().map_err(|e| StoreError::Backend {
			message: format!("Failed to sync {}: {e}", tmp_path.display()),
		})?;
	}

	fs::rename(&tmp_path, path).map_err(|e| {
		let _ = fs::remove_file(&tmp_path);

		StoreError::Backend { message: format!("Failed to replace {}: {e}", path.display()) }
	})
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<(), StoreError> {
	use std::os::unix::fs::DirBuilderExt;

	fs::DirBuilder::new().recursive(true).mode(0o700).create(dir).map_err(|e| {
		StoreError::Backend {
			message: format!("Failed to create directory {}: {e}", dir.display()),
		}
	})
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<(), StoreError> {
	fs::create_dir_all(dir).map_err(|e| StoreError::Backend {
		message: format!("Failed to create directory {}: {e}", dir.display()),
	})
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
	use std::os::unix::fs::OpenOptionsExt;

	OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
	OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_client_error_with_source() {
		let store_error = StoreError::Backend { message: "disk unavailable".into() };
		let client_error: Error = store_error.clone().into();

		assert!(matches!(client_error, Error::Storage(_)));
		assert!(client_error.to_string().contains("disk unavailable"));

		let source = std::error::Error::source(&client_error)
			.expect("Client error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn data_dir_resolution_order() {
		let explicit = DataDir::resolve(
			"zvelo",
			Some(PathBuf::from("/explicit")),
			Some("/xdg".into()),
			Some(PathBuf::from("/home/u")),
		)
		.expect("Explicit dir should resolve.");

		assert_eq!(explicit.path(), Path::new("/explicit/zvelo"));

		let home = Some(PathBuf::from("/home/u"));
		let xdg = DataDir::resolve("zvelo", None, Some("/xdg".into()), home)
			.expect("XDG dir should resolve.");

		assert_eq!(xdg.path(), Path::new("/xdg/zvelo"));

		let home = DataDir::resolve("zvelo", None, Some("".into()), Some(PathBuf::from("/home/u")))
			.expect("Home dir should resolve.");

		assert_eq!(home.path(), Path::new("/home/u/.local/share/zvelo"));
		assert!(matches!(
			DataDir::resolve("zvelo", None, None, None),
			Err(ConfigError::MissingDataDir)
		));
	}

	#[test]
	fn cache_paths_are_deterministic() {
		let dir = DataDir::new("/data", "zvelo");
		let scope_a = ScopeSet::new(["b", "a"]).expect("Scope fixture should be valid.");
		let scope_b = ScopeSet::new(["a", "b"]).expect("Scope fixture should be valid.");

		assert_eq!(dir.token_path("client", &scope_a), dir.token_path("client", &scope_b));
		assert_ne!(dir.token_path("client", &scope_a), dir.token_path("user", &scope_a));
		assert_eq!(
			dir.key_path("https://keys.example.com/jwks"),
			dir.key_path("https://keys.example.com/jwks")
		);
		assert!(
			dir.key_path("k")
				.file_name()
				.and_then(|name| name.to_str())
				.is_some_and(|name| name.starts_with("key_") && name.ends_with(".json"))
		);
	}

	#[cfg(unix)]
	#[test]
	fn private_writes_use_restrictive_modes() {
		use std::os::unix::fs::PermissionsExt;

		let temp = tempfile::tempdir().expect("Temp dir should be created.");
		let path = temp.path().join("nested").join("value.json");

		write_private_json(&path, &serde_json::json!({ "a": 1 }))
			.expect("Private write should succeed.");

		let file_mode = fs::metadata(&path).expect("File should exist.").permissions().mode();
		let dir_mode = fs::metadata(temp.path().join("nested"))
			.expect("Directory should exist.")
			.permissions()
			.mode();

		assert_eq!(file_mode & 0o777, 0o600);
		assert_eq!(dir_mode & 0o777, 0o700);

		let value: Option<serde_json::Value> = read_json(&path).expect("Value should read back.");

		assert_eq!(value, Some(serde_json::json!({ "a": 1 })));
		assert_eq!(
			read_json::<serde_json::Value>(&temp.path().join("missing.json"))
				.expect("Missing files are not errors."),
			None
		);
	}
}
