//! Worker pool: N polling loops that claim, execute and complete tasks.

pub mod handler;
pub mod pool;

pub use handler::{SimulatedWork, TaskHandler};
pub use pool::{PoolConfig, WorkerPool};
