//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

use super::entry::CacheEntry;

/// Trait for cache storage backends.
///
/// Point lookup and point upsert are all the load path needs; listing and
/// clearing back the `cache` subcommand.
pub trait CacheStorage: Send + Sync {
  /// Get the entry stored under `key`.
  fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

  /// Insert or overwrite the entry under `entry.key`.
  fn put(&self, entry: &CacheEntry) -> Result<()>;

  /// All stored entries, most recently written first.
  fn entries(&self) -> Result<Vec<CacheEntry>>;

  /// Remove every entry, returning how many were removed.
  fn clear(&self) -> Result<usize>;
}

impl<T: CacheStorage + ?Sized> CacheStorage for Box<T> {
  fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
    (**self).get(key)
  }

  fn put(&self, entry: &CacheEntry) -> Result<()> {
    (**self).put(entry)
  }

  fn entries(&self) -> Result<Vec<CacheEntry>> {
    (**self).entries()
  }

  fn clear(&self) -> Result<usize> {
    (**self).clear()
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
    Ok(None) // Always miss
  }

  fn put(&self, _entry: &CacheEntry) -> Result<()> {
    Ok(()) // Discard
  }

  fn entries(&self) -> Result<Vec<CacheEntry>> {
    Ok(Vec::new())
  }

  fn clear(&self) -> Result<usize> {
    Ok(0)
  }
}

/// SQLite-based cache storage implementation.
///
/// The database file is shared by every launcher invocation. No lock is held
/// across a read-reload-write sequence, so concurrent writers race and the
/// last one wins.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Create a new SQLite storage at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the cache database at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open the database at `path`, recreating the file when the existing one
  /// cannot be opened. Whatever it held is lost.
  pub fn open_or_reset_at(path: &Path) -> Result<Self> {
    match Self::open_at(path) {
      Ok(storage) => Ok(storage),
      Err(e) => {
        warn!(path = %path.display(), error = %e, "cache database unusable, recreating it");
        remove_database_files(path)?;
        Self::open_at(path)
      }
    }
  }

  /// Open a private in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    // Other launcher processes may be writing the same file
    conn
      .busy_timeout(Duration::from_secs(5))
      .map_err(|e| eyre!("Failed to set cache busy timeout: {}", e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    Ok(crate::config::Config::data_dir()?.join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Open the cache at `path` for reads and best-effort writes.
///
/// An unusable database degrades to [`NoopStorage`]: every lookup misses and
/// listings still reach the remote side.
pub fn open_or_bypass(path: &Path) -> Box<dyn CacheStorage> {
  match SqliteStorage::open_at(path) {
    Ok(storage) => Box::new(storage),
    Err(e) => {
      warn!(path = %path.display(), error = %e, "cache unavailable, continuing without it");
      Box::new(NoopStorage)
    }
  }
}

/// Remove the database file and any journal files SQLite left next to it.
fn remove_database_files(path: &Path) -> Result<()> {
  for suffix in ["", "-journal", "-wal", "-shm"] {
    let mut file = path.as_os_str().to_owned();
    file.push(suffix);
    let file = PathBuf::from(file);

    match std::fs::remove_file(&file) {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => return Err(eyre!("Failed to remove {}: {}", file.display(), e)),
    }
  }
  Ok(())
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    stored_at TEXT NOT NULL,
    ttl_ms INTEGER NOT NULL,
    payload BLOB NOT NULL
);
"#;

type EntryRow = (String, String, String, i64, Vec<u8>);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
  Ok((
    row.get(0)?,
    row.get(1)?,
    row.get(2)?,
    row.get(3)?,
    row.get(4)?,
  ))
}

fn into_entry((key, description, stored_at, ttl_ms, payload): EntryRow) -> Result<CacheEntry> {
  Ok(CacheEntry {
    key,
    description,
    stored_at: parse_datetime(&stored_at)?,
    ttl: Duration::from_millis(u64::try_from(ttl_ms).unwrap_or(0)),
    payload,
  })
}

impl CacheStorage for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row = conn
      .query_row(
        "SELECT cache_key, description, stored_at, ttl_ms, payload FROM cache_entries
         WHERE cache_key = ?",
        params![key],
        read_row,
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry {}: {}", key, e))?;

    row.map(into_entry).transpose()
  }

  fn put(&self, entry: &CacheEntry) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let ttl_ms = i64::try_from(entry.ttl.as_millis()).unwrap_or(i64::MAX);

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (cache_key, description, stored_at, ttl_ms, payload)
         VALUES (?, ?, ?, ?, ?)",
        params![
          entry.key,
          entry.description,
          format_datetime(entry.stored_at),
          ttl_ms,
          entry.payload
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry {}: {}", entry.key, e))?;

    Ok(())
  }

  fn entries(&self) -> Result<Vec<CacheEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT cache_key, description, stored_at, ttl_ms, payload FROM cache_entries
         ORDER BY stored_at DESC",
      )
      .map_err(|e| eyre!("Failed to prepare entry query: {}", e))?;

    let rows: Vec<EntryRow> = stmt
      .query_map([], read_row)
      .map_err(|e| eyre!("Failed to query cache entries: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read cache entries: {}", e))?;

    rows.into_iter().map(into_entry).collect()
  }

  fn clear(&self) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM cache_entries", [])
      .map_err(|e| eyre!("Failed to clear cache: {}", e))
  }
}

/// RFC 3339 with millisecond precision; sorts lexically in time order.
fn format_datetime(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(key: &str, payload: &[u8]) -> CacheEntry {
    CacheEntry::new(
      key.to_string(),
      format!("desc {}", key),
      Duration::from_secs(90),
      payload.to_vec(),
    )
  }

  #[test]
  fn test_get_missing_returns_none() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    assert!(storage.get("nope").unwrap().is_none());
  }

  #[test]
  fn test_put_then_get() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let e = entry("projects", b"[1,2,3]");
    storage.put(&e).unwrap();

    let loaded = storage.get("projects").unwrap().unwrap();
    assert_eq!(loaded.payload, b"[1,2,3]");
    assert_eq!(loaded.ttl, Duration::from_secs(90));
    assert_eq!(loaded.description, "desc projects");
    // Millisecond precision survives the round trip
    assert_eq!(
      loaded.stored_at.timestamp_millis(),
      e.stored_at.timestamp_millis()
    );
  }

  #[test]
  fn test_put_overwrites_in_place() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put(&entry("k", b"1")).unwrap();
    storage.put(&entry("k", b"2")).unwrap();

    assert_eq!(storage.get("k").unwrap().unwrap().payload, b"2");
    assert_eq!(storage.entries().unwrap().len(), 1);
  }

  #[test]
  fn test_clear_removes_everything() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put(&entry("a", b"1")).unwrap();
    storage.put(&entry("b", b"2")).unwrap();

    assert_eq!(storage.clear().unwrap(), 2);
    assert!(storage.entries().unwrap().is_empty());
  }

  #[test]
  fn test_entries_persist_across_connections() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    {
      let storage = SqliteStorage::open_at(&path).unwrap();
      storage.put(&entry("branches", b"[]")).unwrap();
    }

    let reopened = SqliteStorage::open_at(&path).unwrap();
    assert!(reopened.get("branches").unwrap().is_some());
  }

  fn garbage_database(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("cache.db");
    std::fs::write(&path, vec![0xA5u8; 4096]).unwrap();
    path
  }

  #[test]
  fn test_garbage_file_does_not_open() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = garbage_database(&dir);
    assert!(SqliteStorage::open_at(&path).is_err());
  }

  #[test]
  fn test_open_or_reset_recreates_garbage_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = garbage_database(&dir);

    let storage = SqliteStorage::open_or_reset_at(&path).unwrap();
    assert_eq!(storage.clear().unwrap(), 0);

    storage.put(&entry("projects", b"[]")).unwrap();
    drop(storage);
    assert!(SqliteStorage::open_at(&path)
      .unwrap()
      .get("projects")
      .unwrap()
      .is_some());
  }

  #[test]
  fn test_open_or_reset_keeps_healthy_database() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cache.db");
    SqliteStorage::open_at(&path)
      .unwrap()
      .put(&entry("issues", b"[1]"))
      .unwrap();

    let storage = SqliteStorage::open_or_reset_at(&path).unwrap();
    assert_eq!(storage.entries().unwrap().len(), 1);
  }

  #[test]
  fn test_open_or_bypass_degrades_to_noop() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = garbage_database(&dir);

    let storage = open_or_bypass(&path);
    storage.put(&entry("k", b"1")).unwrap();
    assert!(storage.get("k").unwrap().is_none());
    assert!(storage.entries().unwrap().is_empty());
  }

  #[test]
  fn test_noop_storage_always_misses() {
    let storage = NoopStorage;
    storage.put(&entry("k", b"1")).unwrap();
    assert!(storage.get("k").unwrap().is_none());
    assert_eq!(storage.clear().unwrap(), 0);
  }
}
