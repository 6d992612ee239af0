//! Task repository: create, fetch, list, optimistic update, delete.

use crate::error::{Error, Result};
use crate::model::{NewTask, Status, Task, TaskFilter, TaskId, TaskUpdate};
use crate::telemetry::metrics;
use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use sqlx::PgExecutor;

/// Column list shared by every query that returns a full task row.
pub(crate) const TASK_COLUMNS: &str =
    "id, title, priority, status, version, created_at, updated_at, started_at, completed_at";

impl super::Db {
    /// Insert a new task. Status, version and timestamps are assigned by the
    /// store.
    pub async fn create_task(&self, new: &NewTask) -> Result<Task> {
        let task = insert_task(&self.pool, new).await?;
        metrics::tasks_created().add(1, &[KeyValue::new("result", "created")]);
        Ok(task)
    }

    /// Get a task by ID.
    pub async fn get_task(&self, id: TaskId) -> Result<Task> {
        fetch_task(&self.pool, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {id}")))
    }

    /// List tasks newest first, optionally filtered by status.
    ///
    /// `limit` is applied as given; callers clamp it.
    pub async fn list_tasks(&self, filter: TaskFilter, limit: i64) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE ($1::text IS NULL OR status = $1)
             ORDER BY created_at DESC, id DESC
             LIMIT $2"
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaskRow::try_into_task).collect()
    }

    /// Apply an edit only if `update.version` is still the stored version.
    ///
    /// One conditional statement: the version check and the write are atomic.
    /// A mismatch, including a row that no longer exists, is `Conflict`.
    /// Never retried here.
    pub async fn update_task(&self, id: TaskId, update: &TaskUpdate) -> Result<Task> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "UPDATE tasks
             SET title = $2, priority = $3, version = version + 1, updated_at = now()
             WHERE id = $1 AND version = $4
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id.0)
        .bind(&update.title)
        .bind(update.priority)
        .bind(update.version)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::from_store)?;

        match row {
            Some(row) => row.try_into_task(),
            None => {
                metrics::update_conflicts().add(1, &[]);
                Err(Error::Conflict(format!(
                    "task {id} is not at version {}",
                    update.version
                )))
            }
        }
    }

    /// Delete a task. No cascade.
    pub async fn delete_task(&self, id: TaskId) -> Result<()> {
        let rows_affected = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(Error::NotFound(format!("task {id}")));
        }
        Ok(())
    }
}

/// Insert on any executor, so the idempotency ledger can create the task
/// inside its reservation transaction.
pub(crate) async fn insert_task<'e, E>(executor: E, new: &NewTask) -> Result<Task>
where
    E: PgExecutor<'e>,
{
    let row: TaskRow = sqlx::query_as(&format!(
        "INSERT INTO tasks (title, priority, status)
         VALUES ($1, $2, 'pending')
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(&new.title)
    .bind(new.priority)
    .fetch_one(executor)
    .await
    .map_err(Error::from_store)?;

    row.try_into_task()
}

pub(crate) async fn fetch_task<'e, E>(executor: E, id: TaskId) -> Result<Option<Task>>
where
    E: PgExecutor<'e>,
{
    let row: Option<TaskRow> =
        sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(executor)
            .await?;

    row.map(TaskRow::try_into_task).transpose()
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
pub(crate) struct TaskRow {
    id: i64,
    title: String,
    priority: i32,
    status: String,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TaskRow {
    pub(crate) fn try_into_task(self) -> Result<Task> {
        let status: Status = self
            .status
            .parse()
            .map_err(|_| Error::Other(format!("task {} has unknown status {}", self.id, self.status)))?;

        Ok(Task {
            id: TaskId(self.id),
            title: self.title,
            priority: self.priority,
            status,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}
