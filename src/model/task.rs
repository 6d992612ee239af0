//! Task model.
//!
//! A task is a unit of work. It has a store-assigned identity, a title, a
//! priority, a lifecycle status and a version token used for optimistic
//! concurrency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lowest accepted priority.
pub const MIN_PRIORITY: i32 = 1;
/// Highest accepted priority. Higher priorities are claimed first.
pub const MAX_PRIORITY: i32 = 10;

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A unit of work tracked by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned, monotonic, immutable.
    pub id: TaskId,

    pub title: String,

    /// In `[MIN_PRIORITY, MAX_PRIORITY]`.
    pub priority: i32,

    pub status: Status,

    /// Optimistic concurrency token. Starts at 1, bumped by exactly one on
    /// every accepted edit.
    pub version: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// When the current (or last) claim moved the task into `processing`.
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Newtype for task IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<i64>()
            .map(TaskId)
            .map_err(|_| Error::Validation(format!("invalid task id: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Waiting for a worker.
    Pending,
    /// Claimed by exactly one worker.
    Processing,
    /// Done. Terminal.
    Completed,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Pending, Status::Processing, Status::Completed];

    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: Status) -> bool {
        use Status::*;
        matches!(
            (self, to),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Pending) // cancelled or failed, re-claimable
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
            Status::Completed => "completed",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Status::Pending),
            "processing" => Ok(Status::Processing),
            "completed" => Ok(Status::Completed),
            other => Err(Error::Validation(format!("unknown status: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Fields for a new task. Status, version and timestamps are server-assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub priority: i32,
}

impl NewTask {
    pub fn new(title: impl Into<String>, priority: i32) -> Self {
        Self {
            title: title.into(),
            priority,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.title, self.priority)
    }
}

/// An edit to an existing task, valid only against `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub title: String,
    pub priority: i32,
    /// The version the caller last observed.
    pub version: i32,
}

impl TaskUpdate {
    pub fn new(title: impl Into<String>, priority: i32, version: i32) -> Self {
        Self {
            title: title.into(),
            priority,
            version,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.title, self.priority)
    }
}

/// Filter for listing tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<Status>,
}

impl TaskFilter {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
        }
    }
}

fn validate_fields(title: &str, priority: i32) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::Validation("title must not be blank".to_string()));
    }
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        return Err(Error::Validation(format!(
            "priority must be between {MIN_PRIORITY} and {MAX_PRIORITY}, got {priority}"
        )));
    }
    Ok(())
}
