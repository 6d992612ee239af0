//! The unit of work a worker runs for each claimed task.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Task;

/// Executes one claimed task.
///
/// The pool runs `handle` on its own tokio task and aborts it on shutdown,
/// so implementations must be cancel-safe: nothing they do may leave
/// external state half-written when dropped at an await point.
/// An `Err` or a panic puts the task back into `pending`.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, task: &Task) -> Result<()>;
}

/// Stand-in for real work: sleeps for a random duration within bounds.
#[derive(Debug, Clone)]
pub struct SimulatedWork {
    min: Duration,
    max: Duration,
}

impl SimulatedWork {
    pub fn new(min: Duration, max: Duration) -> Result<Self> {
        if min > max {
            return Err(Error::Config(format!(
                "simulated work minimum {min:?} exceeds maximum {max:?}"
            )));
        }
        Ok(Self { min, max })
    }

    fn pick_duration(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl Default for SimulatedWork {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(2),
            max: Duration::from_secs(4),
        }
    }
}

#[async_trait]
impl TaskHandler for SimulatedWork {
    async fn handle(&self, task: &Task) -> Result<()> {
        let took = self.pick_duration();
        debug!(id = %task.id, took_ms = took.as_millis() as u64, "simulating work");
        tokio::time::sleep(took).await;
        Ok(())
    }
}
