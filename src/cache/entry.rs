//! Per-key cache entry bookkeeping.

use chrono::{DateTime, Utc};

/// Fetch state of a single cache entry.
///
/// The error message lives inside the variant, so an entry in the error
/// state always has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
  /// No fetch in progress; data (if present) is the last successful result
  Idle,
  /// A fetch for this key is in flight
  Loading,
  /// The most recent fetch failed
  Error(String),
}

impl FetchStatus {
  pub fn is_loading(&self) -> bool {
    matches!(self, FetchStatus::Loading)
  }

  pub fn is_error(&self) -> bool {
    matches!(self, FetchStatus::Error(_))
  }

  /// The failure message, if the last fetch failed.
  pub fn error_message(&self) -> Option<&str> {
    match self {
      FetchStatus::Error(msg) => Some(msg),
      _ => None,
    }
  }
}

/// Bookkeeping for one async-fetched resource.
///
/// `data` survives failed refreshes: a fetch error updates `status` but
/// never discards the last-known-good payload, so callers can keep showing
/// stale data annotated with the error.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
  /// Last successfully fetched payload, if any
  pub data: Option<V>,
  pub status: FetchStatus,
  /// Stamped on every successful fetch; cleared by invalidation
  pub last_fetched_at: Option<DateTime<Utc>>,
}

impl<V> Default for CacheEntry<V> {
  fn default() -> Self {
    Self {
      data: None,
      status: FetchStatus::Idle,
      last_fetched_at: None,
    }
  }
}

impl<V> CacheEntry<V> {
  /// Record a successful fetch result.
  pub fn record_success(&mut self, data: V, now: DateTime<Utc>) {
    self.data = Some(data);
    self.status = FetchStatus::Idle;
    self.last_fetched_at = Some(now);
  }

  /// Record a failed fetch. Existing data and fetch timestamp are kept.
  pub fn record_failure(&mut self, message: String) {
    self.status = FetchStatus::Error(message);
  }

  /// Forget the fetch timestamp so the next read refetches, keeping the
  /// data available for optimistic stale display.
  pub fn invalidate(&mut self) {
    self.last_fetched_at = None;
  }
}
