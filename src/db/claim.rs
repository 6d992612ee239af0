//! Claim protocol and worker-side transitions.
//!
//! `claim_task` hands one pending task to exactly one caller. Selection,
//! row lock and the `pending -> processing` write happen in a single
//! statement; `SKIP LOCKED` lets concurrent claimers move past rows another
//! claim is holding instead of queueing behind it.

use super::task::{TASK_COLUMNS, TaskRow};
use crate::error::{Error, Result};
use crate::model::{Status, Task, TaskId};
use crate::telemetry::metrics;
use opentelemetry::KeyValue;

/// Validate a status transition, returning an error if disallowed.
fn validate_transition(id: TaskId, from: Status, to: Status) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(invalid_transition(id, from, to))
    }
}

fn invalid_transition(id: TaskId, from: Status, to: Status) -> Error {
    Error::InvalidTransition {
        id: id.0,
        from: from.to_string(),
        to: to.to_string(),
    }
}

fn record_transition(from: Status, to: Status) {
    metrics::task_state_transitions().add(
        1,
        &[
            KeyValue::new("from", from.as_str()),
            KeyValue::new("to", to.as_str()),
        ],
    );
}

impl super::Db {
    /// Claim the highest-priority pending task, oldest first among equals.
    ///
    /// Returns `None` when no unlocked pending task exists. That is the normal
    /// "nothing to do" answer, not an error.
    pub async fn claim_task(&self) -> Result<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "WITH claimed AS (
                 SELECT id FROM tasks
                 WHERE status = 'pending'
                 ORDER BY priority DESC, created_at ASC, id ASC
                 FOR UPDATE SKIP LOCKED
                 LIMIT 1
             )
             UPDATE tasks
             SET status = 'processing', started_at = now(), updated_at = now()
             FROM claimed
             WHERE tasks.id = claimed.id
             RETURNING {}",
            qualified_columns()
        ))
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|_| {
            metrics::claim_attempts().add(1, &[KeyValue::new("result", "error")]);
        })?;

        let Some(row) = row else {
            metrics::claim_attempts().add(1, &[KeyValue::new("result", "empty")]);
            return Ok(None);
        };

        metrics::claim_attempts().add(1, &[KeyValue::new("result", "claimed")]);
        record_transition(Status::Pending, Status::Processing);
        row.try_into_task().map(Some)
    }

    /// Mark a claimed task done: `processing -> completed`.
    ///
    /// Keyed on id alone; the worker holding the claim is the only writer of
    /// this transition, so no version check. The status guard turns a task
    /// deleted or released underneath the worker into `InvalidTransition`.
    pub async fn complete_task(&self, id: TaskId) -> Result<Task> {
        validate_transition(id, Status::Processing, Status::Completed)?;

        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "UPDATE tasks
             SET status = 'completed', completed_at = now(), updated_at = now()
             WHERE id = $1 AND status = 'processing'
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| invalid_transition(id, Status::Processing, Status::Completed))?;
        record_transition(Status::Processing, Status::Completed);
        row.try_into_task()
    }

    /// Return a claimed task to the queue: `processing -> pending`.
    ///
    /// Used when work is cancelled or fails. Bumps `version`, so an editor
    /// still holding the pre-release version gets `Conflict` rather than
    /// silently writing over a task that went back to the queue.
    pub async fn release_task(&self, id: TaskId) -> Result<Task> {
        validate_transition(id, Status::Processing, Status::Pending)?;

        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "UPDATE tasks
             SET status = 'pending', started_at = NULL, version = version + 1, updated_at = now()
             WHERE id = $1 AND status = 'processing'
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| invalid_transition(id, Status::Processing, Status::Pending))?;
        record_transition(Status::Processing, Status::Pending);
        row.try_into_task()
    }
}

/// `UPDATE ... FROM` makes bare column names ambiguous with the CTE.
fn qualified_columns() -> String {
    TASK_COLUMNS
        .split(", ")
        .map(|c| format!("tasks.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}
