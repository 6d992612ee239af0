//! Task service: the narrow interface the request layer calls.
//!
//! Validates input before it reaches the store, clamps list limits and
//! routes keyed creates through the idempotency ledger. Holds no state of
//! its own beyond the shared [`Db`] handle, so it is cheap to clone into
//! every request handler.

use std::sync::Arc;

use tracing::{debug, info};

use crate::db::Db;
use crate::db::idempotency::Resolution;
use crate::error::Result;
use crate::model::{NewTask, Stats, Task, TaskFilter, TaskId, TaskUpdate};

/// Page size when the caller gives none.
pub const DEFAULT_LIST_LIMIT: i64 = 20;
/// Largest page a caller can ask for.
pub const MAX_LIST_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct TaskService {
    db: Arc<Db>,
}

impl TaskService {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Create a task, deduplicated on `idempotency_key` when one is given.
    ///
    /// Keys are compared byte for byte; only the empty key means no
    /// deduplication.
    pub async fn create(&self, new: NewTask, idempotency_key: Option<&str>) -> Result<Resolution> {
        new.validate()?;

        let resolution = match normalize_key(idempotency_key) {
            Some(key) => self.db.resolve_idempotent(key, &new).await?,
            None => Resolution::Created(self.db.create_task(&new).await?),
        };

        let task = resolution.task();
        if resolution.is_existing() {
            debug!(id = %task.id, "idempotent replay");
        } else {
            info!(id = %task.id, priority = task.priority, "task created");
        }
        Ok(resolution)
    }

    pub async fn get(&self, id: TaskId) -> Result<Task> {
        self.db.get_task(id).await
    }

    pub async fn list(&self, filter: TaskFilter, limit: Option<i64>) -> Result<Vec<Task>> {
        self.db.list_tasks(filter, clamp_limit(limit)).await
    }

    /// Apply an edit if `update.version` matches; `Conflict` otherwise.
    /// Never retried: the caller re-fetches and decides.
    pub async fn update(&self, id: TaskId, update: TaskUpdate) -> Result<Task> {
        update.validate()?;
        let task = self.db.update_task(id, &update).await?;
        info!(id = %task.id, version = task.version, "task updated");
        Ok(task)
    }

    pub async fn delete(&self, id: TaskId) -> Result<()> {
        self.db.delete_task(id).await?;
        info!(%id, "task deleted");
        Ok(())
    }

    pub async fn stats(&self) -> Result<Stats> {
        self.db.compute_stats().await
    }
}

fn normalize_key(key: Option<&str>) -> Option<&str> {
    key.filter(|k| !k.is_empty())
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    match limit {
        Some(n) if n > 0 => n.min(MAX_LIST_LIMIT),
        _ => DEFAULT_LIST_LIMIT,
    }
}
