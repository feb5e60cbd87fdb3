//! The remote API seam consumed by the store façade.
//!
//! The actual REST client lives in the application; the store only sees
//! this trait, which makes test doubles trivial and keeps network
//! concerns (auth, timeouts, retries) out of the cache layer.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
  DashboardStats, FileStats, NewFile, Page, ProjectFile, ProjectFilter, ProjectPatch,
  ProjectSummary,
};

/// Progress callback handed to `upload_files`.
///
/// Invokable any number of times with non-decreasing percent values
/// before the upload resolves. Implementations must tolerate out-of-order
/// delivery; the tracker clamps on its side.
pub type ProgressSink = Arc<dyn Fn(u8) + Send + Sync>;

/// Remote resource API for the ProjectHub backend.
///
/// All errors carry a human-readable message via [`crate::StoreError`].
#[async_trait]
pub trait ProjectApi: Send + Sync {
  /// Fetch all files attached to a project.
  async fn fetch_files(&self, project_id: &str) -> Result<Vec<ProjectFile>>;

  /// Fetch aggregate file statistics for a project.
  async fn fetch_file_stats(&self, project_id: &str) -> Result<FileStats>;

  /// Fetch dashboard-wide statistics.
  async fn fetch_dashboard_stats(&self) -> Result<DashboardStats>;

  /// List projects matching a filter, paginated server-side.
  async fn list_projects(&self, filter: &ProjectFilter) -> Result<Page<ProjectSummary>>;

  /// Update a project; returns the authoritative post-update summary.
  async fn update_project(&self, project_id: &str, patch: &ProjectPatch)
    -> Result<ProjectSummary>;

  /// Delete a single file from a project.
  async fn delete_file(&self, project_id: &str, file_id: &str) -> Result<()>;

  /// Upload files to a project, reporting progress through `progress`.
  /// Resolves with the stored file records.
  async fn upload_files(
    &self,
    project_id: &str,
    files: Vec<NewFile>,
    progress: ProgressSink,
  ) -> Result<Vec<ProjectFile>>;
}
