use sqlx::{PgPool, Row};
use tracing::instrument;

use super::{CounterStore, SequenceError};
use crate::db;

/// Counters in the `sequence_counters` table.
///
/// One upsert statement increments and returns the value, so concurrent
/// allocations serialize on the row lock and never read-modify-write in the
/// application.
#[derive(Debug, Clone)]
pub struct PostgresCounterStore {
    pool: PgPool,
}

impl PostgresCounterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self), err)]
    pub async fn increment_async(&self, series: &str) -> Result<u64, SequenceError> {
        let row = sqlx::query(
            r#"
            INSERT INTO sequence_counters (series, next_value)
            VALUES ($1, 1)
            ON CONFLICT (series)
            DO UPDATE SET next_value = sequence_counters.next_value + 1
            RETURNING next_value
            "#,
        )
        .bind(series)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SequenceError::Unavailable(format!("increment {series}: {e}")))?;

        let value: i64 = row
            .try_get("next_value")
            .map_err(|e| SequenceError::Unavailable(format!("read next_value: {e}")))?;
        u64::try_from(value).map_err(|_| SequenceError::Overflow(series.to_string()))
    }
}

impl CounterStore for PostgresCounterStore {
    fn increment(&self, series: &str) -> Result<u64, SequenceError> {
        db::block_on(self.increment_async(series)).map_err(SequenceError::Unavailable)?
    }
}
