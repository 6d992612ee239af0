//! Task execution span helpers.

use crate::model::TaskId;
use tracing::Span;

/// Start a span for one worker executing one claimed task.
///
/// `task.status` is declared empty and updated by
/// [`record_state_transition`].
pub fn start_task_span(worker: usize, task_id: TaskId) -> Span {
    tracing::info_span!(
        "task.execute",
        "task.worker" = worker,
        "task.id" = task_id.0,
        "task.status" = tracing::field::Empty,
    )
}

/// Record a status change on `span`: sets `task.status` and emits an event.
pub fn record_state_transition(span: &Span, from: &str, to: &str) {
    span.record("task.status", to);
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
}
