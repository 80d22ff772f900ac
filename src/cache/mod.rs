//! TTL-based load-or-store cache for remote listings.
//!
//! This module provides a GitLab-agnostic caching mechanism that:
//! - Stores serialized values under a hashed query key with a timestamp and TTL
//! - Returns fresh entries without touching the network
//! - Reloads, persists and returns a value when the entry is missing or stale
//! - Treats unreadable entries as misses so format changes heal themselves

mod entry;
mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{open_or_bypass, CacheStorage, NoopStorage, SqliteStorage};
pub use traits::QueryKey;
