//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};

/// A typed description of a remote query that can be cached.
///
/// Implementors provide a stable hash used as the storage key and a
/// human-readable description shown by `glaunch cache list`.
pub trait QueryKey {
  /// Stable, fixed-length identifier for this query
  fn cache_hash(&self) -> String;

  /// Human-readable description (e.g., "pipelines for project 42")
  fn description(&self) -> String;
}

/// Plain string keys are stored as-is.
impl QueryKey for str {
  fn cache_hash(&self) -> String {
    self.to_string()
  }

  fn description(&self) -> String {
    self.to_string()
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from freshly reloaded data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from a fresh cache entry.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Reloaded from the remote side
  Network,
  /// Served from a fresh cache entry
  Cache,
}
