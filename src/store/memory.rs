//! Thread-safe in-memory [`KeyCache`].

// self
use crate::{
	_prelude::*,
	httpsig::JwkSet,
	store::{KeyCache, StoreFuture},
};

/// Keeps key sets for the lifetime of the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryKeyCache(Arc<RwLock<HashMap<String, JwkSet>>>);
impl MemoryKeyCache {
	/// Number of cached key IDs.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl KeyCache for MemoryKeyCache {
	fn get<'a>(&'a self, key_id: &'a str) -> StoreFuture<'a, Option<JwkSet>> {
		let found = self.0.read().get(key_id).cloned();

		Box::pin(async move { Ok(found) })
	}

	fn set<'a>(&'a self, key_id: &'a str, keys: &'a JwkSet) -> StoreFuture<'a, ()> {
		self.0.write().insert(key_id.to_owned(), keys.clone());

		Box::pin(async move { Ok(()) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::httpsig::Jwk;

	#[tokio::test]
	async fn set_then_get() {
		let cache = MemoryKeyCache::default();
		let set = JwkSet { keys: vec![Jwk { kty: "EC".into(), ..Default::default() }] };

		assert_eq!(cache.get("k").await.expect("Read should succeed."), None);

		cache.set("k", &set).await.expect("Write should succeed.");

		assert_eq!(cache.get("k").await.expect("Read should succeed."), Some(set));
		assert_eq!(cache.len(), 1);
	}
}
