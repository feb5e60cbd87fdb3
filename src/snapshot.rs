//! Best-effort persistence of cache contents across restarts.
//!
//! Only data and its fetch timestamp are persisted, one row per cache key,
//! grouped by a domain string ("project_files", "dashboard", ...).
//! Transient state (loading flags, errors, upload progress) never touches
//! disk. Reads are best effort: a corrupt row is skipped, not fatal.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::error::{Result, StoreError};

/// A persisted cache row: key, payload, fetch timestamp.
pub type SnapshotRow<T> = (String, T, DateTime<Utc>);

/// Trait for snapshot storage backends.
pub trait SnapshotStorage: Send + Sync {
  /// Replace all rows for a domain.
  fn save<T: Serialize>(&self, domain: &str, rows: &[SnapshotRow<T>]) -> Result<()>;

  /// Load all rows for a domain. Undecodable rows are skipped.
  fn load<T: DeserializeOwned>(&self, domain: &str) -> Result<Vec<SnapshotRow<T>>>;

  /// Drop all rows for a domain.
  fn clear(&self, domain: &str) -> Result<()>;
}

/// Storage implementation that doesn't persist anything.
/// Used when snapshotting is disabled - all operations are no-ops.
pub struct NoopSnapshot;

impl SnapshotStorage for NoopSnapshot {
  fn save<T: Serialize>(&self, _domain: &str, _rows: &[SnapshotRow<T>]) -> Result<()> {
    Ok(()) // Discard
  }

  fn load<T: DeserializeOwned>(&self, _domain: &str) -> Result<Vec<SnapshotRow<T>>> {
    Ok(Vec::new()) // Always empty
  }

  fn clear(&self, _domain: &str) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based snapshot storage.
pub struct SqliteSnapshot {
  conn: Mutex<Connection>,
}

/// Schema for the snapshot table.
const SNAPSHOT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS resource_snapshot (
    domain TEXT NOT NULL,
    entry_key TEXT NOT NULL,
    data BLOB NOT NULL,
    fetched_at TEXT NOT NULL,
    PRIMARY KEY (domain, entry_key)
);
"#;

impl SqliteSnapshot {
  /// Open or create the snapshot database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the snapshot database at a specific path.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| StoreError::Snapshot(format!("failed to create snapshot directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      StoreError::Snapshot(format!(
        "failed to open snapshot database at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::from_connection(conn)
  }

  /// In-memory snapshot database, used in tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| StoreError::Snapshot(format!("failed to open in-memory database: {}", e)))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SNAPSHOT_SCHEMA)
      .map_err(|e| StoreError::Snapshot(format!("failed to run snapshot migrations: {}", e)))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| StoreError::Snapshot("could not determine data directory".to_string()))?;

    Ok(data_dir.join("projhub").join("snapshot.db"))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| StoreError::Snapshot(format!("lock poisoned: {}", e)))
  }
}

impl SnapshotStorage for SqliteSnapshot {
  fn save<T: Serialize>(&self, domain: &str, rows: &[SnapshotRow<T>]) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| StoreError::Snapshot(format!("failed to begin transaction: {}", e)))?;

    conn
      .execute(
        "DELETE FROM resource_snapshot WHERE domain = ?",
        params![domain],
      )
      .map_err(|e| StoreError::Snapshot(format!("failed to delete old rows: {}", e)))?;

    for (key, data, fetched_at) in rows {
      let blob = serde_json::to_vec(data)
        .map_err(|e| StoreError::Snapshot(format!("failed to serialize entry: {}", e)))?;

      conn
        .execute(
          "INSERT OR REPLACE INTO resource_snapshot (domain, entry_key, data, fetched_at)
           VALUES (?, ?, ?, ?)",
          params![domain, key, blob, fetched_at.to_rfc3339()],
        )
        .map_err(|e| StoreError::Snapshot(format!("failed to store entry: {}", e)))?;
    }

    conn
      .execute("COMMIT", [])
      .map_err(|e| StoreError::Snapshot(format!("failed to commit transaction: {}", e)))?;

    Ok(())
  }

  fn load<T: DeserializeOwned>(&self, domain: &str) -> Result<Vec<SnapshotRow<T>>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT entry_key, data, fetched_at FROM resource_snapshot WHERE domain = ?")
      .map_err(|e| StoreError::Snapshot(format!("failed to prepare query: {}", e)))?;

    let raw_rows: Vec<(String, Vec<u8>, String)> = stmt
      .query_map(params![domain], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
      })
      .map_err(|e| StoreError::Snapshot(format!("failed to query rows: {}", e)))?
      .filter_map(|r| r.ok())
      .collect();

    let mut rows = Vec::with_capacity(raw_rows.len());
    for (key, blob, fetched_at_str) in raw_rows {
      let data: T = match serde_json::from_slice(&blob) {
        Ok(data) => data,
        Err(e) => {
          warn!(domain, key = %key, "skipping undecodable snapshot row: {}", e);
          continue;
        }
      };
      let fetched_at = match DateTime::parse_from_rfc3339(&fetched_at_str) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => {
          warn!(domain, key = %key, "skipping snapshot row with bad timestamp: {}", e);
          continue;
        }
      };
      rows.push((key, data, fetched_at));
    }

    Ok(rows)
  }

  fn clear(&self, domain: &str) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute(
        "DELETE FROM resource_snapshot WHERE domain = ?",
        params![domain],
      )
      .map_err(|e| StoreError::Snapshot(format!("failed to clear domain: {}", e)))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::ProjectFile;

  fn sample_file(id: &str) -> ProjectFile {
    ProjectFile {
      id: id.to_string(),
      project_id: "p1".to_string(),
      name: format!("{}.pdf", id),
      size_bytes: 1024,
      content_type: "application/pdf".to_string(),
      uploaded_by: "student1".to_string(),
      uploaded_at: "2026-08-01T10:00:00Z".to_string(),
    }
  }

  #[test]
  fn save_and_load_round_trip() {
    let storage = SqliteSnapshot::open_in_memory().unwrap();
    let fetched_at = Utc::now();

    storage
      .save(
        "project_files",
        &[("p1".to_string(), vec![sample_file("f1")], fetched_at)],
      )
      .unwrap();

    let rows: Vec<SnapshotRow<Vec<ProjectFile>>> = storage.load("project_files").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "p1");
    assert_eq!(rows[0].1[0].id, "f1");
    assert_eq!(rows[0].2.timestamp(), fetched_at.timestamp());
  }

  #[test]
  fn save_replaces_the_domain() {
    let storage = SqliteSnapshot::open_in_memory().unwrap();
    let now = Utc::now();

    storage
      .save("project_files", &[("p1".to_string(), vec![sample_file("f1")], now)])
      .unwrap();
    storage
      .save("project_files", &[("p2".to_string(), vec![sample_file("f2")], now)])
      .unwrap();

    let rows: Vec<SnapshotRow<Vec<ProjectFile>>> = storage.load("project_files").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "p2");
  }

  #[test]
  fn domains_are_isolated() {
    let storage = SqliteSnapshot::open_in_memory().unwrap();
    let now = Utc::now();

    storage
      .save("project_files", &[("p1".to_string(), vec![sample_file("f1")], now)])
      .unwrap();
    storage.clear("dashboard").unwrap();

    let rows: Vec<SnapshotRow<Vec<ProjectFile>>> = storage.load("project_files").unwrap();
    assert_eq!(rows.len(), 1);
    let empty: Vec<SnapshotRow<Vec<ProjectFile>>> = storage.load("dashboard").unwrap();
    assert!(empty.is_empty());
  }

  #[test]
  fn corrupt_rows_are_skipped_not_fatal() {
    let storage = SqliteSnapshot::open_in_memory().unwrap();
    {
      let conn = storage.conn.lock().unwrap();
      conn
        .execute(
          "INSERT INTO resource_snapshot (domain, entry_key, data, fetched_at)
           VALUES ('project_files', 'bad', X'00FF', '2026-08-01T10:00:00Z')",
          [],
        )
        .unwrap();
    }

    let rows: Vec<SnapshotRow<Vec<ProjectFile>>> = storage.load("project_files").unwrap();
    assert!(rows.is_empty());
  }

  #[test]
  fn noop_snapshot_discards_everything() {
    let storage = NoopSnapshot;
    storage
      .save("project_files", &[("p1".to_string(), vec![sample_file("f1")], Utc::now())])
      .unwrap();
    let rows: Vec<SnapshotRow<Vec<ProjectFile>>> = storage.load("project_files").unwrap();
    assert!(rows.is_empty());
  }
}
