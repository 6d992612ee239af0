//! Database connection pool, migrations, and health check.
//!
//! The store is the only shared mutable resource. Every operation on [`Db`]
//! is a stateless, reentrant call against the pool; coordination between
//! concurrent callers rests entirely on Postgres row locks, conditional
//! updates and unique constraints.

pub mod claim;
pub mod idempotency;
pub mod stats;
pub mod task;

use crate::error::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Default pool size when none is configured.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Database handle. Owns the connection pool shared across all modules.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Connect to Postgres with an explicit pool size.
    pub async fn connect_with(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests use this to pin a schema).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
