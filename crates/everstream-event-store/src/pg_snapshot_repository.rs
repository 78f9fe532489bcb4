//! `PostgreSQL` implementation of the `SnapshotRepository` trait.

use async_trait::async_trait;
use everstream_core::error::Error;
use everstream_core::snapshot::{SnapshotRecord, SnapshotRepository};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// PostgreSQL-backed snapshot store, keyed by
/// `(aggregate_id, aggregate_type)` with at most one row per key.
#[derive(Debug, Clone)]
pub struct PgSnapshotRepository {
    pool: PgPool,
}

impl PgSnapshotRepository {
    /// Creates a new `PgSnapshotRepository` over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the snapshots table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] on a database failure.
    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::raw_sql(crate::schema::CREATE_SNAPSHOTS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

fn store_error(error: sqlx::Error) -> Error {
    Error::Store(error.to_string())
}

#[async_trait]
impl SnapshotRepository for PgSnapshotRepository {
    async fn upsert(&self, record: SnapshotRecord) -> Result<(), Error> {
        sqlx::query(
            r"
            INSERT INTO snapshots (aggregate_id, aggregate_type, version, state, taken_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (aggregate_id, aggregate_type)
            DO UPDATE SET version = EXCLUDED.version,
                          state = EXCLUDED.state,
                          taken_at = EXCLUDED.taken_at
            ",
        )
        .bind(record.aggregate_id)
        .bind(&record.aggregate_type)
        .bind(record.version)
        .bind(sqlx::types::Json(&record.state))
        .bind(record.taken_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        tracing::debug!(
            aggregate_id = %record.aggregate_id,
            aggregate_type = %record.aggregate_type,
            version = record.version,
            "saved snapshot"
        );
        Ok(())
    }

    async fn find_latest(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
    ) -> Result<Option<SnapshotRecord>, Error> {
        let row = sqlx::query(
            r"
            SELECT aggregate_id, aggregate_type, version, state, taken_at
            FROM snapshots
            WHERE aggregate_id = $1 AND aggregate_type = $2
            ",
        )
        .bind(aggregate_id)
        .bind(aggregate_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(|row| {
            let state: sqlx::types::Json<serde_json::Value> =
                row.try_get("state").map_err(store_error)?;
            Ok(SnapshotRecord {
                aggregate_id: row.try_get("aggregate_id").map_err(store_error)?,
                aggregate_type: row.try_get("aggregate_type").map_err(store_error)?,
                version: row.try_get("version").map_err(store_error)?,
                state: state.0,
                taken_at: row.try_get("taken_at").map_err(store_error)?,
            })
        })
        .transpose()
    }

    async fn delete_all(&self, aggregate_id: Uuid, aggregate_type: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM snapshots WHERE aggregate_id = $1 AND aggregate_type = $2")
            .bind(aggregate_id)
            .bind(aggregate_type)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}
