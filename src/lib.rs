//! Client-side data layer for the ProjectHub application.
//!
//! This crate provides the pieces every ProjectHub client store repeats:
//! - A TTL-based resource cache that deduplicates concurrent fetches for
//!   the same key and keeps last-known-good data through failed refreshes
//! - An upload-progress tracker with monotone progress and grace-window
//!   cleanup of finished tasks
//! - A store façade per domain composing the two over an injected remote
//!   API client
//!
//! The REST client, UI rendering and notification delivery live in the
//! application; the store only sees [`ProjectApi`].

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod upload;

pub use api::{ProgressSink, ProjectApi};
pub use cache::{CacheEntry, FetchStatus, ResourceCache, StalenessPolicy};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use snapshot::{NoopSnapshot, SnapshotStorage, SqliteSnapshot};
pub use store::ProjectStore;
pub use types::{
  DashboardStats, FileStats, NewFile, Page, Pagination, ProjectFile, ProjectFilter, ProjectPatch,
  ProjectStatus, ProjectSummary,
};
pub use upload::{UploadStatus, UploadTask, UploadTracker};
