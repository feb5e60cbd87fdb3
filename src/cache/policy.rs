//! TTL-based staleness decisions.

use chrono::{DateTime, Duration, Utc};

use super::entry::CacheEntry;

/// Decides whether a cached entry is fresh enough to reuse.
///
/// One policy is constructed per resource class; the TTL comes from
/// configuration, not from the call site, so the freshness arithmetic
/// lives in exactly one place.
#[derive(Debug, Clone, Copy)]
pub struct StalenessPolicy {
  ttl: Duration,
}

impl StalenessPolicy {
  pub fn new(ttl: Duration) -> Self {
    Self { ttl }
  }

  /// Convenience constructor from whole seconds.
  pub fn from_secs(secs: i64) -> Self {
    Self::new(Duration::seconds(secs))
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  /// An entry is fresh iff it has data, has been fetched, and the fetch is
  /// within the TTL. Anything else (never fetched, invalidated, expired)
  /// is stale and must trigger a fetch.
  pub fn is_fresh<V>(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
    match (&entry.data, entry.last_fetched_at) {
      (Some(_), Some(fetched_at)) => now - fetched_at < self.ttl,
      _ => false,
    }
  }
}
