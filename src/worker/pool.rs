//! Worker pool: a fixed set of polling loops, started and stopped together.
//!
//! Each loop ticks on a fixed interval, claims at most one task per tick and
//! runs it through the [`TaskHandler`]. Errors are logged and the loop moves
//! on to the next tick; nothing a single task does can take the pool down.
//! Stopping cancels a shared token and joins every loop. Work in flight is
//! cancelled cooperatively and its task released back to `pending`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, trace, warn};

use super::handler::TaskHandler;
use crate::db::Db;
use crate::error::{Error, Result};
use crate::model::Task;
use crate::telemetry::metrics;
use crate::telemetry::task::{record_state_transition, start_task_span};

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// How often each worker tries to claim a task.
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// A fixed-size set of worker loops sharing one store.
pub struct WorkerPool {
    db: Arc<Db>,
    handler: Arc<dyn TaskHandler>,
    config: PoolConfig,
    cancel: CancellationToken,
    tracker: TaskTracker,
    started: AtomicBool,
}

impl WorkerPool {
    pub fn new(db: Arc<Db>, handler: Arc<dyn TaskHandler>, config: PoolConfig) -> Self {
        Self {
            db,
            handler,
            config,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Spawn `workers` loops on the current tokio runtime.
    ///
    /// A pool runs once: starting it twice, or after `stop`, is an error.
    pub fn start(&self, workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(Error::Config("worker pool needs at least one worker".to_string()));
        }
        if self.cancel.is_cancelled() {
            return Err(Error::Other("worker pool already stopped".to_string()));
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Other("worker pool already started".to_string()));
        }

        info!(workers, poll_ms = self.config.poll_interval.as_millis() as u64, "starting worker pool");

        for id in 0..workers {
            let worker = Worker {
                id,
                db: Arc::clone(&self.db),
                handler: Arc::clone(&self.handler),
                poll_interval: self.config.poll_interval,
                cancel: self.cancel.clone(),
            };
            self.tracker.spawn(worker.run());
        }
        Ok(())
    }

    /// Signal every loop to stop and wait until all of them have exited.
    ///
    /// No loop starts a new claim once this is called. Work in flight is
    /// cancelled and its task returned to `pending` before the loop exits.
    pub async fn stop(&self) {
        info!("stopping worker pool");
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("worker pool stopped");
    }

    /// Loops still alive.
    pub fn active_workers(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// How one execution attempt ended.
enum Outcome {
    Done,
    Cancelled,
    Failed(Error),
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Done => "completed",
            Outcome::Cancelled => "cancelled",
            Outcome::Failed(_) => "failed",
        }
    }
}

struct Worker {
    id: usize,
    db: Arc<Db>,
    handler: Arc<dyn TaskHandler>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(worker = self.id, "worker started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.process_next().await {
                error!(worker = self.id, error = %e, "worker error");
            }
        }

        debug!(worker = self.id, "worker stopped");
    }

    /// Claim and execute at most one task.
    async fn process_next(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }

        let Some(task) = self.db.claim_task().await? else {
            trace!(worker = self.id, "no pending task");
            return Ok(());
        };

        let span = start_task_span(self.id, task.id);
        self.execute(task, &span).instrument(span.clone()).await
    }

    async fn execute(&self, task: Task, span: &tracing::Span) -> Result<()> {
        record_state_transition(span, "pending", "processing");
        info!(title = %task.title, priority = task.priority, "processing task");

        let started = Instant::now();
        // Own task, so a panicking handler surfaces as a JoinError here
        // instead of unwinding through the worker loop.
        let handler = Arc::clone(&self.handler);
        let work = task.clone();
        let mut run = tokio::spawn(
            async move { handler.handle(&work).await }.instrument(tracing::Span::current()),
        );
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => {
                run.abort();
                // Wait for the handler future to be dropped before releasing.
                let _ = (&mut run).await;
                Outcome::Cancelled
            }
            res = &mut run => match res {
                Ok(Ok(())) => Outcome::Done,
                Ok(Err(e)) => Outcome::Failed(e),
                Err(e) if e.is_panic() => {
                    Outcome::Failed(Error::Other(format!("handler panicked: {e}")))
                }
                Err(e) => Outcome::Failed(Error::Other(format!("handler did not finish: {e}"))),
            },
        };
        let took = started.elapsed();

        metrics::operation_duration_ms().record(
            took.as_secs_f64() * 1000.0,
            &[
                KeyValue::new("operation", "task.execute"),
                KeyValue::new("outcome", outcome.label()),
            ],
        );

        match outcome {
            Outcome::Done => {
                self.db.complete_task(task.id).await?;
                record_state_transition(span, "processing", "completed");
                info!(took_ms = took.as_millis() as u64, "task completed");
            }
            Outcome::Cancelled => {
                self.db.release_task(task.id).await?;
                record_state_transition(span, "processing", "pending");
                warn!(took_ms = took.as_millis() as u64, "task cancelled, returned to pending");
            }
            Outcome::Failed(e) => {
                error!(error = %e, "task failed, returning to pending");
                self.db.release_task(task.id).await?;
                record_state_transition(span, "processing", "pending");
            }
        }
        Ok(())
    }
}
