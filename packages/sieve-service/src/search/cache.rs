use std::{sync::Arc, time::Duration};

use moka::{policy::EvictionPolicy, sync::Cache};
use serde_json::Value;

use crate::{BoxFuture, Error, Result, ResultCache, search::ScoredResult};

const SEARCH_CACHE_SCHEMA_VERSION: i32 = 1;

pub fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::Cache {
		message: format!("Failed to encode cache key payload: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

pub fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}

pub fn build_search_cache_key(collection: &str, query: &str, limit: usize) -> Result<String> {
	let payload = serde_json::json!({
		"kind": "search",
		"schema_version": SEARCH_CACHE_SCHEMA_VERSION,
		"collection": collection,
		"query": query.trim(),
		"limit": limit,
	});

	hash_cache_key(&payload)
}

/// Process-local result cache bounded by entry count, with an optional time to live.
/// Least recently used entries are evicted first and expired entries are purged during
/// maintenance.
pub struct MemoryResultCache {
	inner: Cache<String, Arc<Vec<ScoredResult>>>,
}
impl MemoryResultCache {
	/// A zero `ttl` disables expiry.
	pub fn new(max_entries: u64, ttl: Duration) -> Self {
		let mut builder = Cache::builder()
			.max_capacity(max_entries.max(1))
			.eviction_policy(EvictionPolicy::lru());

		if !ttl.is_zero() {
			builder = builder.time_to_live(ttl);
		}

		Self { inner: builder.build() }
	}

	pub fn from_config(cfg: &sieve_config::Cache) -> Self {
		Self::new(u64::from(cfg.max_entries), Duration::from_secs(cfg.ttl_secs))
	}

	/// Entry count after pending evictions and expirations have been applied.
	pub fn len(&self) -> u64 {
		self.inner.run_pending_tasks();

		self.inner.entry_count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn lookup(&self, key: &str) -> Option<Vec<ScoredResult>> {
		self.inner.get(key).map(|results| results.as_ref().clone())
	}

	fn store(&self, key: &str, results: &[ScoredResult]) {
		self.inner.insert(key.to_string(), Arc::new(results.to_vec()));
	}
}
impl ResultCache for MemoryResultCache {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<ScoredResult>>>> {
		Box::pin(async move { Ok(self.lookup(key)) })
	}

	fn set<'a>(&'a self, key: &'a str, results: &'a [ScoredResult]) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.store(key, results);

			Ok(())
		})
	}
}
