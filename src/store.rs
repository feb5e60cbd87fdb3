//! The store façade: the only surface application code talks to.
//!
//! One `ProjectStore` owns a cache per resource class plus the upload
//! tracker, and reaches the backend only through the injected
//! [`ProjectApi`]. Every read verb is cache-aware; every write verb
//! patches the affected cache entries in place or invalidates them, so
//! the cache never diverges from server state after a successful
//! mutation.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::{ProgressSink, ProjectApi};
use crate::cache::{CacheEntry, ResourceCache, StalenessPolicy};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::snapshot::SnapshotStorage;
use crate::types::{
  DashboardStats, FileStats, NewFile, Page, ProjectFile, ProjectFilter, ProjectPatch,
  ProjectSummary,
};
use crate::upload::{UploadTask, UploadTracker};

/// The dashboard is a single global resource; it still goes through the
/// keyed cache so it shares the freshness/dedup machinery.
const DASHBOARD_KEY: &str = "global";

const FILES_DOMAIN: &str = "project_files";
const FILE_STATS_DOMAIN: &str = "file_stats";
const DASHBOARD_DOMAIN: &str = "dashboard";

/// Cache-aware store for one ProjectHub client session.
///
/// Cheap to clone; clones share the same caches and tracker, so every UI
/// surface holding a clone observes the same state.
#[derive(Clone)]
pub struct ProjectStore {
  api: Arc<dyn ProjectApi>,
  files: ResourceCache<String, Vec<ProjectFile>>,
  file_stats: ResourceCache<String, FileStats>,
  dashboard: ResourceCache<String, DashboardStats>,
  project_pages: ResourceCache<String, Page<ProjectSummary>>,
  uploads: UploadTracker,
}

impl ProjectStore {
  pub fn new(api: Arc<dyn ProjectApi>, config: &StoreConfig) -> Self {
    let cache = &config.cache;
    Self {
      api,
      files: ResourceCache::new(StalenessPolicy::from_secs(
        cache.project_files_ttl_secs as i64,
      )),
      file_stats: ResourceCache::new(StalenessPolicy::from_secs(
        cache.file_stats_ttl_secs as i64,
      )),
      dashboard: ResourceCache::new(StalenessPolicy::from_secs(cache.dashboard_ttl_secs as i64)),
      project_pages: ResourceCache::new(StalenessPolicy::from_secs(
        cache.project_list_ttl_secs as i64,
      )),
      uploads: UploadTracker::new(config.uploads.grace()),
    }
  }

  // ==========================================================================
  // Read verbs (cache-aware)
  // ==========================================================================

  /// Files attached to a project, from cache when fresh.
  pub async fn project_files(&self, project_id: &str) -> Result<Vec<ProjectFile>> {
    let api = Arc::clone(&self.api);
    let id = project_id.to_string();
    self
      .files
      .get_or_fetch(project_id.to_string(), move || async move {
        api.fetch_files(&id).await
      })
      .await
  }

  /// Synchronous cache read; never triggers a fetch.
  pub fn cached_project_files(&self, project_id: &str) -> Option<Vec<ProjectFile>> {
    self.files.get(&project_id.to_string())
  }

  /// Full entry for a project's file list, for status/error display.
  pub fn files_entry(&self, project_id: &str) -> Option<CacheEntry<Vec<ProjectFile>>> {
    self.files.entry(&project_id.to_string())
  }

  /// Force a refetch of a project's files, bypassing the cache.
  pub async fn refresh_project_files(&self, project_id: &str) -> Result<Vec<ProjectFile>> {
    let api = Arc::clone(&self.api);
    let id = project_id.to_string();
    self
      .files
      .force_refresh(project_id.to_string(), move || async move {
        api.fetch_files(&id).await
      })
      .await
  }

  /// Aggregate file statistics for a project.
  pub async fn file_stats(&self, project_id: &str) -> Result<FileStats> {
    let api = Arc::clone(&self.api);
    let id = project_id.to_string();
    self
      .file_stats
      .get_or_fetch(project_id.to_string(), move || async move {
        api.fetch_file_stats(&id).await
      })
      .await
  }

  /// Dashboard-wide statistics.
  pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
    let api = Arc::clone(&self.api);
    self
      .dashboard
      .get_or_fetch(DASHBOARD_KEY.to_string(), move || async move {
        api.fetch_dashboard_stats().await
      })
      .await
  }

  /// One page of projects matching a filter. Pages are cached per
  /// normalized filter, so pagination back-and-forth doesn't refetch.
  pub async fn search_projects(&self, filter: &ProjectFilter) -> Result<Page<ProjectSummary>> {
    let api = Arc::clone(&self.api);
    let filter_owned = filter.clone();
    self
      .project_pages
      .get_or_fetch(filter.cache_hash(), move || async move {
        api.list_projects(&filter_owned).await
      })
      .await
  }

  // ==========================================================================
  // Write verbs (patch-or-invalidate after every successful mutation)
  // ==========================================================================

  /// Delete a file, then patch the cached file list in place. Stats are
  /// invalidated rather than patched - the server owns the aggregates.
  pub async fn delete_file(&self, project_id: &str, file_id: &str) -> Result<()> {
    self.api.delete_file(project_id, file_id).await?;

    let key = project_id.to_string();
    if !self.files.patch(&key, |files| files.retain(|f| f.id != file_id)) {
      self.files.invalidate(&key);
    }
    self.file_stats.invalidate(&key);
    self.dashboard.invalidate(&DASHBOARD_KEY.to_string());
    Ok(())
  }

  /// Update a project, then patch every cached list page with the
  /// authoritative summary the server returned.
  pub async fn update_project(
    &self,
    project_id: &str,
    patch: &ProjectPatch,
  ) -> Result<ProjectSummary> {
    let updated = self.api.update_project(project_id, patch).await?;

    self.project_pages.patch_all(|_, page| {
      for item in page.items.iter_mut() {
        if item.id == updated.id {
          *item = updated.clone();
        }
      }
    });
    // Status changes move the dashboard counters.
    self.dashboard.invalidate(&DASHBOARD_KEY.to_string());
    Ok(updated)
  }

  // ==========================================================================
  // Uploads
  // ==========================================================================

  /// Start uploading files to a project.
  ///
  /// Returns the tracker task id for progress lookups and a join handle
  /// resolving with the stored file records. The upload runs on its own
  /// task: dropping the handle detaches it, never cancels it. On success
  /// the cached file list is patched with the new records; on failure the
  /// task transitions to error and the cache is untouched.
  pub fn begin_upload(
    &self,
    project_id: &str,
    files: Vec<NewFile>,
  ) -> (String, JoinHandle<Result<Vec<ProjectFile>>>) {
    let task_id = self.uploads.begin(project_id, files.len() as u32);
    debug!(task_id = %task_id, count = files.len(), "starting upload");

    let store = self.clone();
    let project_id = project_id.to_string();
    let id = task_id.clone();

    let handle = tokio::spawn(async move {
      let sink: ProgressSink = {
        let uploads = store.uploads.clone();
        let id = id.clone();
        Arc::new(move |percent| {
          uploads.report_progress(&id, percent);
        })
      };

      match store.api.upload_files(&project_id, files, sink).await {
        Ok(stored) => {
          store.uploads.complete(&id);
          if !store
            .files
            .patch(&project_id, |list| list.extend(stored.iter().cloned()))
          {
            store.files.invalidate(&project_id);
          }
          store.file_stats.invalidate(&project_id);
          Ok(stored)
        }
        Err(err) => {
          store.uploads.fail(&id, err.message());
          Err(err)
        }
      }
    });

    (task_id, handle)
  }

  pub fn upload_status(&self, task_id: &str) -> Option<UploadTask> {
    self.uploads.get(task_id)
  }

  /// Remove finished uploads past their grace window. Active uploads are
  /// never touched.
  pub fn cleanup_uploads(&self) {
    self.uploads.cleanup();
  }

  pub fn active_uploads(&self) -> usize {
    self.uploads.active_count()
  }

  // ==========================================================================
  // Lifecycle
  // ==========================================================================

  /// Drop all cached state for one project.
  pub fn clear_project(&self, project_id: &str) {
    let key = project_id.to_string();
    self.files.clear(&key);
    self.file_stats.clear(&key);
  }

  /// Drop all cached state. Upload tasks are untouched; use
  /// [`Self::cleanup_uploads`] for those.
  pub fn clear_all(&self) {
    self.files.clear_all();
    self.file_stats.clear_all();
    self.dashboard.clear_all();
    self.project_pages.clear_all();
  }

  /// Persist cache contents (data + fetch timestamps only).
  ///
  /// Filtered list pages are deliberately not persisted: their keys are
  /// filter hashes and go stale with the first server-side change.
  pub fn persist<S: SnapshotStorage>(&self, storage: &S) -> Result<()> {
    storage.save(FILES_DOMAIN, &self.files.export())?;
    storage.save(FILE_STATS_DOMAIN, &self.file_stats.export())?;
    storage.save(DASHBOARD_DOMAIN, &self.dashboard.export())?;
    Ok(())
  }

  /// Seed caches from a snapshot. Live entries are never overwritten.
  pub fn hydrate<S: SnapshotStorage>(&self, storage: &S) -> Result<()> {
    self.files.restore(storage.load(FILES_DOMAIN)?);
    self.file_stats.restore(storage.load(FILE_STATS_DOMAIN)?);
    self.dashboard.restore(storage.load(DASHBOARD_DOMAIN)?);
    Ok(())
  }
}
