//! Domain types for the ProjectHub client.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A file attached to a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
  pub id: String,
  pub project_id: String,
  pub name: String,
  pub size_bytes: u64,
  pub content_type: String,
  pub uploaded_by: String,
  pub uploaded_at: String,
}

/// Aggregate file statistics for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStats {
  pub project_id: String,
  pub file_count: u64,
  pub total_bytes: u64,
}

/// Dashboard-wide statistics (admin view)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
  pub total_projects: u64,
  pub pending_review: u64,
  pub approved: u64,
  pub rejected: u64,
  pub active_students: u64,
}

/// Review status of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
  Draft,
  Submitted,
  Approved,
  Rejected,
}

/// Summary of a project for list views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
  pub id: String,
  pub title: String,
  pub status: ProjectStatus,
  pub owner: String,
  pub updated_at: String,
}

/// Fields a review/update call may change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPatch {
  pub title: Option<String>,
  pub status: Option<ProjectStatus>,
}

/// A file staged for upload
#[derive(Debug, Clone)]
pub struct NewFile {
  pub name: String,
  pub content_type: String,
  pub bytes: Vec<u8>,
}

/// Server-side pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
  pub page: u32,
  pub limit: u32,
  pub total: u64,
  pub total_pages: u32,
}

/// One page of a listed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub pagination: Pagination,
}

/// Filter parameters for project list queries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFilter {
  pub status: Option<ProjectStatus>,
  pub search: Option<String>,
  pub page: u32,
  pub limit: u32,
}

impl ProjectFilter {
  /// Stable cache key for this filter.
  ///
  /// Search text is normalized (trimmed, lowercased) so trivially
  /// different spellings of the same query share a cache entry; the
  /// result is SHA256-hashed for a fixed-length key.
  pub fn cache_hash(&self) -> String {
    let status = match self.status {
      Some(ProjectStatus::Draft) => "draft",
      Some(ProjectStatus::Submitted) => "submitted",
      Some(ProjectStatus::Approved) => "approved",
      Some(ProjectStatus::Rejected) => "rejected",
      None => "",
    };
    let search = self
      .search
      .as_deref()
      .map(|s| s.trim().to_lowercase())
      .unwrap_or_default();
    let input = format!(
      "projects:{}:{}:{}:{}",
      status, search, self.page, self.limit
    );

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn filter_hash_is_stable_and_normalized() {
    let a = ProjectFilter {
      status: Some(ProjectStatus::Submitted),
      search: Some("  Robot Arm ".to_string()),
      page: 1,
      limit: 20,
    };
    let b = ProjectFilter {
      status: Some(ProjectStatus::Submitted),
      search: Some("robot arm".to_string()),
      page: 1,
      limit: 20,
    };
    assert_eq!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn filter_hash_differs_by_page() {
    let a = ProjectFilter {
      page: 1,
      limit: 20,
      ..ProjectFilter::default()
    };
    let b = ProjectFilter {
      page: 2,
      limit: 20,
      ..ProjectFilter::default()
    };
    assert_ne!(a.cache_hash(), b.cache_hash());
  }
}
