//! Error types for the store layer.
//!
//! All variants carry plain display messages and the whole enum is `Clone`:
//! a deduplicated fetch hands the identical failure to every caller that
//! joined the in-flight request.

use thiserror::Error;

/// Errors surfaced by the cache, tracker and store façade.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
  /// A remote fetch failed. Cached data, if any, is left untouched.
  #[error("fetch failed: {0}")]
  Fetch(String),

  /// An upload task failed. Other in-flight uploads are unaffected.
  #[error("upload failed: {0}")]
  Upload(String),

  /// An operation referenced an upload task id the tracker does not know.
  #[error("unknown upload task: {0}")]
  UnknownTask(String),

  /// Configuration file could not be read or parsed.
  #[error("config error: {0}")]
  Config(String),

  /// Best-effort cache snapshot could not be read or written.
  #[error("snapshot error: {0}")]
  Snapshot(String),
}

impl StoreError {
  /// The human-readable message carried by this error, without the
  /// variant prefix. This is what cache entries record for display.
  pub fn message(&self) -> &str {
    match self {
      StoreError::Fetch(m)
      | StoreError::Upload(m)
      | StoreError::UnknownTask(m)
      | StoreError::Config(m)
      | StoreError::Snapshot(m) => m,
    }
  }
}

pub type Result<T> = std::result::Result<T, StoreError>;
