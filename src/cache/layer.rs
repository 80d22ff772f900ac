//! Cache layer that orchestrates the load-or-store flow around a reload function.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::entry::CacheEntry;
use super::storage::CacheStorage;
use super::traits::{CacheResult, QueryKey};

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the command layer and the remote client. A fresh
/// entry is served without calling the reload function; anything else reloads
/// and overwrites the entry.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
    }
  }

  /// The underlying storage backend.
  #[cfg(test)]
  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Return the cached value for `key` if fresh, otherwise reload and store it.
  pub async fn load_or_store<K, V, F, Fut>(&self, key: &K, ttl: Duration, reload: F) -> Result<V>
  where
    K: QueryKey + ?Sized,
    V: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V>>,
  {
    let result = self.fetch(key, ttl, reload).await?;
    debug!(
      description = %key.description(),
      source = ?result.source,
      cached_at = ?result.cached_at,
      "served"
    );
    Ok(result.data)
  }

  /// Like [`load_or_store`](Self::load_or_store), reporting where the value came from.
  ///
  /// 1. Check cache - if fresh and readable, return immediately
  /// 2. Otherwise call `reload`; its error propagates and the entry is untouched
  /// 3. Persist the reloaded value; a failed write is logged, the value still returned
  pub async fn fetch<K, V, F, Fut>(
    &self,
    key: &K,
    ttl: Duration,
    reload: F,
  ) -> Result<CacheResult<V>>
  where
    K: QueryKey + ?Sized,
    V: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V>>,
  {
    let hash = key.cache_hash();

    if let Some((data, cached_at)) = self.lookup::<V>(&hash, ttl) {
      debug!(key = %hash, "cache hit");
      return Ok(CacheResult::from_cache(data, cached_at));
    }

    debug!(key = %hash, description = %key.description(), "cache miss, reloading");
    let data = reload().await?;
    self.store(&hash, key.description(), ttl, &data);

    Ok(CacheResult::from_network(data))
  }

  /// Read a fresh, decodable entry. Every failure mode is a miss.
  fn lookup<V: DeserializeOwned>(&self, hash: &str, ttl: Duration) -> Option<(V, DateTime<Utc>)> {
    let entry = match self.storage.get(hash) {
      Ok(Some(entry)) => entry,
      Ok(None) => return None,
      Err(e) => {
        warn!(key = %hash, error = %e, "cache read failed, treating as miss");
        return None;
      }
    };

    if !entry.is_fresh_at(Utc::now(), ttl) {
      debug!(key = %hash, stored_at = %entry.stored_at, "cache entry is stale");
      return None;
    }

    match serde_json::from_slice(&entry.payload) {
      Ok(data) => Some((data, entry.stored_at)),
      Err(e) => {
        warn!(key = %hash, error = %e, "discarding unreadable cache entry");
        None
      }
    }
  }

  fn store<V: Serialize>(&self, hash: &str, description: String, ttl: Duration, data: &V) {
    let payload = match serde_json::to_vec(data) {
      Ok(payload) => payload,
      Err(e) => {
        warn!(key = %hash, error = %e, "failed to serialize reloaded value, not caching");
        return;
      }
    };

    let entry = CacheEntry::new(hash.to_string(), description, ttl, payload);
    if let Err(e) = self.storage.put(&entry) {
      warn!(key = %hash, error = %e, "failed to persist cache entry");
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}
