//! Upload progress tracking keyed by generated task ids.
//!
//! Zero or more uploads progress concurrently; each task is independent
//! and one task's updates never touch another's. Terminal tasks stay
//! queryable for a grace window so the UI can show a final "100% / done"
//! state, then an explicit, idempotent `cleanup()` removes them. Nothing
//! is removed behind the caller's back by a timer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::warn;

/// Status of one upload task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
  Uploading,
  Completed,
  /// Upload failed; progress is frozen at its last value
  Error(String),
}

impl UploadStatus {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, UploadStatus::Uploading)
  }

  pub fn error_message(&self) -> Option<&str> {
    match self {
      UploadStatus::Error(msg) => Some(msg),
      _ => None,
    }
  }
}

/// One tracked upload.
#[derive(Debug, Clone)]
pub struct UploadTask {
  /// Caller-visible id, used for progress lookups
  pub id: String,
  pub resource_id: String,
  pub total_files: u32,
  pub completed_files: u32,
  /// Monotonically non-decreasing while uploading; exactly 100 once completed
  pub progress_percent: u8,
  pub status: UploadStatus,
  /// When the task reached a terminal state; drives grace-window cleanup
  pub terminal_at: Option<Instant>,
}

/// Tracker for in-flight and recently finished uploads.
pub struct UploadTracker {
  tasks: Arc<Mutex<HashMap<String, UploadTask>>>,
  /// How long terminal tasks stay queryable before cleanup may remove them
  grace: Duration,
}

impl UploadTracker {
  pub fn new(grace: Duration) -> Self {
    Self {
      tasks: Arc::new(Mutex::new(HashMap::new())),
      grace,
    }
  }

  /// Allocate a new task in the uploading state with progress 0.
  ///
  /// Ids are `{resource_id}_{micros}`, bumped on collision so that
  /// concurrent begins for the same resource always produce independent
  /// tasks.
  pub fn begin(&self, resource_id: &str, file_count: u32) -> String {
    let mut tasks = self.tasks.lock();

    let mut stamp = Utc::now().timestamp_micros();
    let mut id = format!("{}_{}", resource_id, stamp);
    while tasks.contains_key(&id) {
      stamp += 1;
      id = format!("{}_{}", resource_id, stamp);
    }

    tasks.insert(
      id.clone(),
      UploadTask {
        id: id.clone(),
        resource_id: resource_id.to_string(),
        total_files: file_count.max(1),
        completed_files: 0,
        progress_percent: 0,
        status: UploadStatus::Uploading,
        terminal_at: None,
      },
    );

    id
  }

  /// Update progress for an uploading task.
  ///
  /// Progress is clamped to be non-decreasing, so out-of-order callback
  /// delivery never makes the bar go backwards. Unknown or terminal tasks
  /// are a no-op; returns whether the update was applied.
  pub fn report_progress(&self, task_id: &str, percent: u8) -> bool {
    let mut tasks = self.tasks.lock();
    let Some(task) = tasks.get_mut(task_id) else {
      warn!(task_id, "progress report for unknown upload task");
      return false;
    };
    if task.status.is_terminal() {
      warn!(task_id, "progress report for terminal upload task");
      return false;
    }

    task.progress_percent = task.progress_percent.max(percent.min(100));
    true
  }

  /// Record that one more file of the batch finished.
  pub fn report_file_completed(&self, task_id: &str) -> bool {
    let mut tasks = self.tasks.lock();
    let Some(task) = tasks.get_mut(task_id) else {
      warn!(task_id, "file completion for unknown upload task");
      return false;
    };
    if task.status.is_terminal() {
      return false;
    }

    task.completed_files = (task.completed_files + 1).min(task.total_files);
    true
  }

  /// Transition to completed. Progress is forced to 100.
  pub fn complete(&self, task_id: &str) -> bool {
    let mut tasks = self.tasks.lock();
    let Some(task) = tasks.get_mut(task_id) else {
      warn!(task_id, "completion for unknown upload task");
      return false;
    };
    if task.status.is_terminal() {
      return false;
    }

    task.status = UploadStatus::Completed;
    task.progress_percent = 100;
    task.completed_files = task.total_files;
    task.terminal_at = Some(Instant::now());
    true
  }

  /// Transition to error. Progress is frozen at its last value; other
  /// tasks are unaffected.
  pub fn fail(&self, task_id: &str, message: &str) -> bool {
    let mut tasks = self.tasks.lock();
    let Some(task) = tasks.get_mut(task_id) else {
      warn!(task_id, "failure report for unknown upload task");
      return false;
    };
    if task.status.is_terminal() {
      return false;
    }

    task.status = UploadStatus::Error(message.to_string());
    task.terminal_at = Some(Instant::now());
    true
  }

  pub fn get(&self, task_id: &str) -> Option<UploadTask> {
    self.tasks.lock().get(task_id).cloned()
  }

  /// Remove terminal tasks past the grace window.
  ///
  /// Uploading tasks are never removed, so an active upload's progress UI
  /// cannot be yanked away. Safe to call from a teardown hook, a periodic
  /// sweep, or both.
  pub fn cleanup(&self) {
    let now = Instant::now();
    let grace = self.grace;
    self.tasks.lock().retain(|_, task| match task.terminal_at {
      Some(at) => now.duration_since(at) < grace,
      None => true,
    });
  }

  /// Number of tasks still uploading.
  pub fn active_count(&self) -> usize {
    self
      .tasks
      .lock()
      .values()
      .filter(|t| !t.status.is_terminal())
      .count()
  }

  pub fn len(&self) -> usize {
    self.tasks.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.lock().is_empty()
  }
}

impl Clone for UploadTracker {
  fn clone(&self) -> Self {
    Self {
      tasks: Arc::clone(&self.tasks),
      grace: self.grace,
    }
  }
}
