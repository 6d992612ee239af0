//! Core data model.

pub mod stats;
pub mod task;

pub use stats::Stats;
pub use task::{MAX_PRIORITY, MIN_PRIORITY, NewTask, Status, Task, TaskFilter, TaskId, TaskUpdate};
