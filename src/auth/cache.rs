//! File-backed token cache layered over a [`TokenFlow`].

// std
use std::path::PathBuf;
// self
use crate::{
	_prelude::*,
	auth::{IssuedToken, ScopeSet, TokenFlow, TokenFuture},
	store::{self, DataDir},
};

/// Persists the wrapped flow's tokens so later invocations skip the exchange.
///
/// The cache file holds `{"token": {..}, "id_token": ".."}`. A valid cached token is returned
/// without calling the inner flow; an expired one is handed to the flow as `previous` so its
/// refresh token can be used. Unreadable or corrupt files are logged and ignored.
pub struct FileTokenCache {
	inner: Arc<dyn TokenFlow>,
	path: PathBuf,
	guard: AsyncMutex<()>,
}
impl FileTokenCache {
	/// Caches `inner` at the path derived from `name` and `scope` inside `dir`.
	pub fn new(inner: Arc<dyn TokenFlow>, dir: &DataDir, name: &str, scope: &ScopeSet) -> Self {
		Self::at_path(inner, dir.token_path(name, scope))
	}

	/// Caches `inner` at an explicit path.
	pub fn at_path(inner: Arc<dyn TokenFlow>, path: impl Into<PathBuf>) -> Self {
		Self { inner, path: path.into(), guard: AsyncMutex::new(()) }
	}

	/// Location of the cache file.
	pub fn path(&self) -> &std::path::Path {
		&self.path
	}

	fn load(&self) -> Option<IssuedToken> {
		match store::read_json::<IssuedToken>(&self.path) {
			Ok(token) => token,
			Err(e) => {
				tracing::warn!(
					path = %self.path.display(),
					error = %e,
					"Ignoring unreadable token cache."
				);

				None
			},
		}
	}
}
impl TokenFlow for FileTokenCache {
	fn fetch<'a>(&'a self, previous: Option<&'a IssuedToken>) -> TokenFuture<'a> {
		Box::pin(async move {
			let _guard = self.guard.lock().await;
			let cached = self.load();

			if let Some(token) = cached.as_ref().filter(|token| token.is_valid()) {
				tracing::debug!(path = %self.path.display(), "Using cached token.");

				return Ok(token.clone());
			}

			let previous = cached.as_ref().or(previous);
			let fresh = self.inner.fetch(previous).await?;

			store::write_private_json(&self.path, &fresh)?;

			Ok(fresh)
		})
	}
}
impl Debug for FileTokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FileTokenCache").field("path", &self.path).finish()
	}
}
