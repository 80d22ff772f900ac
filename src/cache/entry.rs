use chrono::{DateTime, Utc};
use std::time::Duration;

/// A single stored cache record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
  pub key: String,
  pub description: String,
  pub stored_at: DateTime<Utc>,
  pub ttl: Duration,
  /// JSON-serialized value
  pub payload: Vec<u8>,
}

impl CacheEntry {
  /// Create an entry stamped with the current time.
  pub fn new(key: String, description: String, ttl: Duration, payload: Vec<u8>) -> Self {
    Self {
      key,
      description,
      stored_at: Utc::now(),
      ttl,
      payload,
    }
  }

  /// Whether the entry is still fresh at `now`.
  ///
  /// The tighter of the recorded TTL and `max_age` applies, so a caller asking
  /// for a shorter lifetime than the writer used still gets a reload.
  pub fn is_fresh_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
    let ttl = self.ttl.min(max_age);
    let Ok(ttl) = chrono::Duration::from_std(ttl) else {
      // Too large to represent: never expires
      return true;
    };
    match self.stored_at.checked_add_signed(ttl) {
      Some(expires_at) => now < expires_at,
      None => true,
    }
  }

  /// Time elapsed since the entry was written, zero if the clock went backwards.
  pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
    now
      .signed_duration_since(self.stored_at)
      .to_std()
      .unwrap_or(Duration::ZERO)
  }
}
