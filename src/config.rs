//! Store configuration.
//!
//! TTLs differ per resource class (the backend updates file lists far more
//! often than dashboard aggregates); the exact values are configuration,
//! not invariants.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  pub cache: CacheConfig,
  pub uploads: UploadConfig,
  pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// TTL for per-project file lists
  pub project_files_ttl_secs: u64,
  /// TTL for per-project file statistics
  pub file_stats_ttl_secs: u64,
  /// TTL for dashboard-wide statistics
  pub dashboard_ttl_secs: u64,
  /// TTL for filtered project list pages
  pub project_list_ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      project_files_ttl_secs: 120,
      file_stats_ttl_secs: 300,
      dashboard_ttl_secs: 600,
      project_list_ttl_secs: 120,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
  /// How long completed/failed uploads stay queryable before cleanup
  pub grace_secs: u64,
}

impl Default for UploadConfig {
  fn default() -> Self {
    Self { grace_secs: 3 }
  }
}

impl UploadConfig {
  pub fn grace(&self) -> Duration {
    Duration::from_secs(self.grace_secs)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
  /// Persist cache contents across restarts (best effort)
  pub enabled: bool,
  /// Snapshot database path (defaults to the platform data directory)
  pub path: Option<PathBuf>,
}

impl StoreConfig {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./projhub.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/projhub/store.yaml
  ///
  /// When no file is found and no explicit path was given, defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(StoreError::Config(format!(
          "config file not found: {}",
          p.display()
        )));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("projhub.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("projhub").join("store.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
      StoreError::Config(format!(
        "failed to read config file {}: {}",
        path.display(),
        e
      ))
    })?;

    serde_yaml::from_str(&contents).map_err(|e| {
      StoreError::Config(format!(
        "failed to parse config file {}: {}",
        path.display(),
        e
      ))
    })
  }
}
