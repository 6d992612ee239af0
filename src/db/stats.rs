//! Stats aggregation over current task rows.

use crate::error::Result;
use crate::model::{Stats, Status};

impl super::Db {
    /// Counts by status and mean processing latency, computed from the
    /// current rows in one statement. No caching.
    pub async fn compute_stats(&self) -> Result<Stats> {
        let rows: Vec<(String, i64, Option<f64>)> = sqlx::query_as(
            "SELECT status,
                    COUNT(*)::BIGINT,
                    AVG(EXTRACT(EPOCH FROM (completed_at - started_at)))::FLOAT8
             FROM tasks
             GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = rows
            .into_iter()
            .map(|(status, count, avg)| Ok((status.parse::<Status>()?, count, avg)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Stats::from_groups(groups))
    }
}
