//! Keyed resource cache with in-flight fetch deduplication.
//!
//! `ResourceCache` answers "do I need to fetch, or can I reuse what I
//! have?" for a map of independently fetched resources. Freshness is
//! decided by a [`StalenessPolicy`]; concurrent callers for the same key
//! share a single in-flight fetch instead of issuing duplicate requests.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;

use super::entry::{CacheEntry, FetchStatus};
use super::policy::StalenessPolicy;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V>>>;

struct Inner<K, V> {
  entries: HashMap<K, CacheEntry<V>>,
  in_flight: HashMap<K, SharedFetch<V>>,
}

/// TTL-cached map of async-fetched resources.
///
/// The cache exclusively owns its entries; callers observe them through
/// cloned snapshots. All locks are released before any await point, so
/// the cache can be shared freely across tasks.
pub struct ResourceCache<K, V> {
  inner: Arc<Mutex<Inner<K, V>>>,
  policy: StalenessPolicy,
}

impl<K, V> ResourceCache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Clone + Send + Sync + 'static,
{
  pub fn new(policy: StalenessPolicy) -> Self {
    Self {
      inner: Arc::new(Mutex::new(Inner {
        entries: HashMap::new(),
        in_flight: HashMap::new(),
      })),
      policy,
    }
  }

  /// Return cached data if fresh, otherwise fetch.
  ///
  /// 1. Fresh entry: return the cached value, `fetch` is never called.
  /// 2. Fetch already in flight for this key: join it. Both callers
  ///    resolve with the same result and the remote is hit exactly once.
  /// 3. Otherwise mark the entry loading and run `fetch` on a detached
  ///    task: the result lands in the cache even if every caller stops
  ///    waiting. Success stores data and stamps `last_fetched_at`;
  ///    failure records the message and keeps any previous data.
  ///
  /// Failures are never retried here; they propagate to the caller.
  pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V>> + Send + 'static,
  {
    let shared = {
      let mut inner = self.inner.lock();

      if let Some(entry) = inner.entries.get(&key) {
        if self.policy.is_fresh(entry, Utc::now()) {
          if let Some(data) = &entry.data {
            return Ok(data.clone());
          }
        }
      }

      if let Some(existing) = inner.in_flight.get(&key) {
        // Duplicate fetch suppressed: fold this caller into the pending
        // request. Not an error.
        debug!("joining in-flight fetch");
        existing.clone()
      } else {
        inner.entries.entry(key.clone()).or_default().status = FetchStatus::Loading;

        let fut = fetch();
        let state = Arc::clone(&self.inner);
        let k = key.clone();
        let shared: SharedFetch<V> = async move {
          let result = fut.await;
          let mut inner = state.lock();
          let entry = inner.entries.entry(k.clone()).or_default();
          match &result {
            Ok(data) => entry.record_success(data.clone(), Utc::now()),
            Err(err) => entry.record_failure(err.message().to_string()),
          }
          inner.in_flight.remove(&k);
          result
        }
        .boxed()
        .shared();

        inner.in_flight.insert(key, shared.clone());
        // Detached driver: late results are still applied to the cache
        // after callers lose interest.
        tokio::spawn(shared.clone());
        shared
      }
    };

    shared.await
  }

  /// Invalidate then fetch, bypassing the freshness check.
  pub async fn force_refresh<F, Fut>(&self, key: K, fetch: F) -> Result<V>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V>> + Send + 'static,
  {
    self.invalidate(&key);
    self.get_or_fetch(key, fetch).await
  }

  /// Synchronous cache read. Never triggers a fetch.
  pub fn get(&self, key: &K) -> Option<V> {
    self.inner.lock().entries.get(key).and_then(|e| e.data.clone())
  }

  /// Snapshot of the full entry for status/error inspection.
  pub fn entry(&self, key: &K) -> Option<CacheEntry<V>> {
    self.inner.lock().entries.get(key).cloned()
  }

  /// Forget the fetch timestamp for `key` so the next read refetches.
  /// Data is kept for optimistic stale display while refetching.
  pub fn invalidate(&self, key: &K) {
    if let Some(entry) = self.inner.lock().entries.get_mut(key) {
      entry.invalidate();
    }
  }

  /// Mutate cached data in place after a confirmed server write.
  ///
  /// The freshness stamp is left untouched: the patched value reflects
  /// what the server just acknowledged. Returns false when there is no
  /// cached data to patch (callers fall back to invalidation).
  pub fn patch<F>(&self, key: &K, f: F) -> bool
  where
    F: FnOnce(&mut V),
  {
    let mut inner = self.inner.lock();
    match inner.entries.get_mut(key).and_then(|e| e.data.as_mut()) {
      Some(data) => {
        f(data);
        true
      }
      None => false,
    }
  }

  /// Apply a mutation to every cached value.
  pub fn patch_all<F>(&self, mut f: F)
  where
    F: FnMut(&K, &mut V),
  {
    let mut inner = self.inner.lock();
    for (key, entry) in inner.entries.iter_mut() {
      if let Some(data) = entry.data.as_mut() {
        f(key, data);
      }
    }
  }

  /// Remove the entry entirely, resetting to the never-fetched state.
  pub fn clear(&self, key: &K) {
    self.inner.lock().entries.remove(key);
  }

  pub fn clear_all(&self) {
    self.inner.lock().entries.clear();
  }

  pub fn len(&self) -> usize {
    self.inner.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.lock().entries.is_empty()
  }

  /// Rows eligible for a best-effort snapshot: data plus its fetch
  /// timestamp. Transient loading/error state never crosses this
  /// boundary.
  pub fn export(&self) -> Vec<(K, V, DateTime<Utc>)> {
    let inner = self.inner.lock();
    inner
      .entries
      .iter()
      .filter_map(|(k, e)| match (&e.data, e.last_fetched_at) {
        (Some(data), Some(at)) => Some((k.clone(), data.clone(), at)),
        _ => None,
      })
      .collect()
  }

  /// Seed the cache from snapshot rows. Entries that already hold data or
  /// are loading are left alone; the snapshot is best-effort and never
  /// overwrites live state.
  pub fn restore(&self, rows: Vec<(K, V, DateTime<Utc>)>) {
    let mut inner = self.inner.lock();
    for (key, data, fetched_at) in rows {
      let entry = inner.entries.entry(key).or_default();
      if entry.data.is_none() && !entry.status.is_loading() {
        entry.data = Some(data);
        entry.status = FetchStatus::Idle;
        entry.last_fetched_at = Some(fetched_at);
      }
    }
  }
}

impl<K, V> Clone for ResourceCache<K, V> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
      policy: self.policy,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::StoreError;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  fn counting_fetch(
    calls: &Arc<AtomicU32>,
    value: Vec<u32>,
  ) -> impl FnOnce() -> futures::future::Ready<Result<Vec<u32>>> {
    let calls = calls.clone();
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      futures::future::ready(Ok(value))
    }
  }

  #[tokio::test]
  async fn fresh_entry_is_not_refetched() {
    let cache = ResourceCache::new(StalenessPolicy::from_secs(120));
    let calls = Arc::new(AtomicU32::new(0));

    let first = cache
      .get_or_fetch("p1".to_string(), counting_fetch(&calls, vec![1, 2]))
      .await
      .unwrap();
    let second = cache
      .get_or_fetch("p1".to_string(), counting_fetch(&calls, vec![9, 9]))
      .await
      .unwrap();

    assert_eq!(first, vec![1, 2]);
    assert_eq!(second, vec![1, 2]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn stale_entry_is_refetched() {
    let cache = ResourceCache::new(StalenessPolicy::new(chrono::Duration::milliseconds(30)));
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .get_or_fetch("p1".to_string(), counting_fetch(&calls, vec![1]))
      .await
      .unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;

    let second = cache
      .get_or_fetch("p1".to_string(), counting_fetch(&calls, vec![2]))
      .await
      .unwrap();

    assert_eq!(second, vec![2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn concurrent_callers_share_one_fetch() {
    let cache = ResourceCache::new(StalenessPolicy::from_secs(120));
    let calls = Arc::new(AtomicU32::new(0));

    let slow = |calls: Arc<AtomicU32>| {
      move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        Ok(vec![7u32])
      }
    };

    let (a, b) = tokio::join!(
      cache.get_or_fetch("dash".to_string(), slow(calls.clone())),
      cache.get_or_fetch("dash".to_string(), slow(calls.clone())),
    );

    assert_eq!(a.unwrap(), vec![7]);
    assert_eq!(b.unwrap(), vec![7]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn failed_refresh_keeps_last_known_good_data() {
    let cache = ResourceCache::new(StalenessPolicy::from_secs(120));
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .get_or_fetch("p1".to_string(), counting_fetch(&calls, vec![1, 2]))
      .await
      .unwrap();

    cache.invalidate(&"p1".to_string());

    let err = cache
      .get_or_fetch("p1".to_string(), || {
        futures::future::ready(Err(StoreError::Fetch("network down".into())))
      })
      .await
      .unwrap_err();

    assert_eq!(err, StoreError::Fetch("network down".into()));
    // Stale-but-available: the old payload survives the failure.
    assert_eq!(cache.get(&"p1".to_string()), Some(vec![1, 2]));
    let entry = cache.entry(&"p1".to_string()).unwrap();
    assert_eq!(entry.status.error_message(), Some("network down"));
  }

  #[tokio::test]
  async fn force_refresh_bypasses_fresh_cache() {
    let cache = ResourceCache::new(StalenessPolicy::from_secs(120));
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .get_or_fetch("p1".to_string(), counting_fetch(&calls, vec![1]))
      .await
      .unwrap();
    let refreshed = cache
      .force_refresh("p1".to_string(), counting_fetch(&calls, vec![2]))
      .await
      .unwrap();

    assert_eq!(refreshed, vec![2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn late_result_lands_after_caller_gives_up() {
    let cache: ResourceCache<String, Vec<u32>> =
      ResourceCache::new(StalenessPolicy::from_secs(120));

    let fetch = || async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      Ok(vec![42u32])
    };

    // Caller times out long before the fetch resolves.
    let timed_out =
      tokio::time::timeout(Duration::from_millis(5), cache.get_or_fetch("p1".to_string(), fetch))
        .await;
    assert!(timed_out.is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(cache.get(&"p1".to_string()), Some(vec![42]));
  }

  #[tokio::test]
  async fn entry_is_loading_while_fetch_in_flight() {
    let cache: ResourceCache<String, u32> = ResourceCache::new(StalenessPolicy::from_secs(120));
    let background = {
      let cache = cache.clone();
      tokio::spawn(async move {
        cache
          .get_or_fetch("p1".to_string(), || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(5u32)
          })
          .await
      })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    let entry = cache.entry(&"p1".to_string()).unwrap();
    assert!(entry.status.is_loading());
    assert!(entry.data.is_none());

    assert_eq!(background.await.unwrap().unwrap(), 5);
  }

  #[tokio::test]
  async fn patch_updates_data_without_refetch() {
    let cache = ResourceCache::new(StalenessPolicy::from_secs(120));
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .get_or_fetch("p1".to_string(), counting_fetch(&calls, vec![1, 2, 3]))
      .await
      .unwrap();

    assert!(cache.patch(&"p1".to_string(), |files| files.retain(|f| *f != 2)));
    assert_eq!(cache.get(&"p1".to_string()), Some(vec![1, 3]));

    // Patched entry is still fresh.
    cache
      .get_or_fetch("p1".to_string(), counting_fetch(&calls, vec![9]))
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(!cache.patch(&"missing".to_string(), |_| {}));
  }

  #[tokio::test]
  async fn clear_resets_to_never_fetched() {
    let cache = ResourceCache::new(StalenessPolicy::from_secs(120));
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .get_or_fetch("p1".to_string(), counting_fetch(&calls, vec![1]))
      .await
      .unwrap();
    cache.clear(&"p1".to_string());
    assert!(cache.entry(&"p1".to_string()).is_none());

    cache
      .get_or_fetch("p1".to_string(), counting_fetch(&calls, vec![2]))
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn export_and_restore_round_trip_data_and_timestamp() {
    let cache = ResourceCache::new(StalenessPolicy::from_secs(120));
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .get_or_fetch("p1".to_string(), counting_fetch(&calls, vec![1]))
      .await
      .unwrap();

    let rows = cache.export();
    assert_eq!(rows.len(), 1);

    let restored: ResourceCache<String, Vec<u32>> =
      ResourceCache::new(StalenessPolicy::from_secs(120));
    restored.restore(rows);

    assert_eq!(restored.get(&"p1".to_string()), Some(vec![1]));
    // Restored entry is fresh within TTL, so no refetch happens.
    restored
      .get_or_fetch("p1".to_string(), counting_fetch(&calls, vec![9]))
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
