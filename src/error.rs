//! Error types for taskq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad input: blank title, priority out of range, unknown status.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The caller's version token no longer matches the stored row.
    #[error("version conflict: {0}")]
    Conflict(String),

    #[error("invalid state transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        id: i64,
        from: String,
        to: String,
    },

    /// A losing idempotent caller never saw the winner's task id.
    #[error("idempotency key {0} is reserved but has no task yet")]
    KeyUnresolved(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map a store error, surfacing check-constraint violations as validation
    /// failures.
    pub(crate) fn from_store(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_check_violation() {
                let constraint = db_err.constraint().unwrap_or("check").to_string();
                return Error::Validation(format!("rejected by store constraint {constraint}"));
            }
        }
        Error::Database(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
