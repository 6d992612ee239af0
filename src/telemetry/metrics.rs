//! Metric instrument factories for taskq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an OTLP endpoint the global provider is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("taskq")
}

/// Counter: tasks handed back from create.
/// Labels: `result` ("created" | "existing").
pub fn tasks_created() -> Counter<u64> {
    meter()
        .u64_counter("taskq.task.created")
        .with_description("Number of task creations, including idempotent replays")
        .build()
}

/// Counter: claim attempts by workers.
/// Labels: `result` ("claimed" | "empty" | "error").
pub fn claim_attempts() -> Counter<u64> {
    meter()
        .u64_counter("taskq.task.claims")
        .with_description("Number of claim attempts")
        .build()
}

/// Counter: task status transitions.
/// Labels: `from`, `to`.
pub fn task_state_transitions() -> Counter<u64> {
    meter()
        .u64_counter("taskq.task.state_transitions")
        .with_description("Number of task status transitions")
        .build()
}

/// Counter: updates rejected for presenting a stale version.
pub fn update_conflicts() -> Counter<u64> {
    meter()
        .u64_counter("taskq.task.update_conflicts")
        .with_description("Number of optimistic updates rejected on version mismatch")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`, `outcome`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("taskq.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
