//! Idempotency ledger: at most one task per client dedup key.
//!
//! The key row, not the task row, is the point of arbitration. A caller
//! first reserves the key by inserting it with no `resource_id`; the primary
//! key decides the single winner. The winner creates the task and fills in
//! `resource_id` inside the same transaction. Losers never create anything:
//! they read the winner's `resource_id`, polling briefly if it is not
//! visible yet, and return the winner's task.

use std::time::Duration;

use super::task::{fetch_task, insert_task};
use crate::error::{Error, Result};
use crate::model::{NewTask, Task, TaskId};
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use tracing::debug;

/// How many times a losing caller looks for the winner's task id.
const LOOKUP_ATTEMPTS: u32 = 20;
/// Pause between lookups; grows linearly with the attempt number.
const LOOKUP_BACKOFF: Duration = Duration::from_millis(10);

/// What resolving a dedup key produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// This call won the key and created the task.
    Created(Task),
    /// Another call already owns the key; this is its task.
    Existing(Task),
}

impl Resolution {
    pub fn task(&self) -> &Task {
        match self {
            Resolution::Created(task) | Resolution::Existing(task) => task,
        }
    }

    pub fn into_task(self) -> Task {
        match self {
            Resolution::Created(task) | Resolution::Existing(task) => task,
        }
    }

    pub fn is_existing(&self) -> bool {
        matches!(self, Resolution::Existing(_))
    }
}

impl super::Db {
    /// Create `new` under `key`, or return the task already created for it.
    ///
    /// Every caller presenting the same key observes the same task id,
    /// whatever the interleaving. `new` is only used by the winner.
    pub async fn resolve_idempotent(&self, key: &str, new: &NewTask) -> Result<Resolution> {
        let mut tx = self.pool.begin().await?;

        // A concurrent reservation of the same key blocks here until its
        // transaction ends, then yields no row.
        let reserved: Option<(String,)> = sqlx::query_as(
            "INSERT INTO idempotency_keys (key, resource_id)
             VALUES ($1, NULL)
             ON CONFLICT (key) DO NOTHING
             RETURNING key",
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?;

        if reserved.is_none() {
            tx.rollback().await?;
            let task = self.await_winner(key).await?;
            metrics::tasks_created().add(1, &[KeyValue::new("result", "existing")]);
            return Ok(Resolution::Existing(task));
        }

        let task = insert_task(&mut *tx, new).await?;

        let filled = sqlx::query(
            "UPDATE idempotency_keys SET resource_id = $2
             WHERE key = $1 AND resource_id IS NULL",
        )
        .bind(key)
        .bind(task.id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if filled != 1 {
            return Err(Error::Other(format!(
                "idempotency key {key} lost its reservation"
            )));
        }

        tx.commit().await?;

        debug!(key, id = %task.id, "idempotency key reserved");
        metrics::tasks_created().add(1, &[KeyValue::new("result", "created")]);
        Ok(Resolution::Created(task))
    }

    /// Look up the task id a key resolved to, if any.
    pub(crate) async fn lookup_idempotency_key(&self, key: &str) -> Result<Option<TaskId>> {
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT resource_id FROM idempotency_keys WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.and_then(|(id,)| id).map(TaskId))
    }

    /// Poll until the winning reservation exposes its task id.
    async fn await_winner(&self, key: &str) -> Result<Task> {
        for attempt in 1..=LOOKUP_ATTEMPTS {
            if let Some(id) = self.lookup_idempotency_key(key).await? {
                // The winner's task may have been deleted since.
                return fetch_task(&self.pool, id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("task {id} for idempotency key {key}")));
            }
            debug!(key, attempt, "idempotency key not resolved yet");
            tokio::time::sleep(LOOKUP_BACKOFF * attempt).await;
        }
        Err(Error::KeyUnresolved(key.to_string()))
    }
}
