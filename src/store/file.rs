//! File-backed [`KeyCache`] under the client's [`DataDir`].

// self
use crate::{
	_prelude::*,
	httpsig::JwkSet,
	store::{self, DataDir, KeyCache, StoreFuture},
};

/// Persists each key set to `key_<sha256(keyId)>.json`.
#[derive(Clone, Debug)]
pub struct FileKeyCache {
	dir: DataDir,
}
impl FileKeyCache {
	/// Caches inside `dir`.
	pub fn new(dir: DataDir) -> Self {
		Self { dir }
	}
}
impl KeyCache for FileKeyCache {
	fn get<'a>(&'a self, key_id: &'a str) -> StoreFuture<'a, Option<JwkSet>> {
		Box::pin(async move { store::read_json(&self.dir.key_path(key_id)) })
	}

	fn set<'a>(&'a self, key_id: &'a str, keys: &'a JwkSet) -> StoreFuture<'a, ()> {
		Box::pin(async move { store::write_private_json(&self.dir.key_path(key_id), keys) })
	}
}
