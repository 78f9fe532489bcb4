//! `PostgreSQL` implementation of the `EventLog` trait.

use async_trait::async_trait;
use everstream_core::error::Error;
use everstream_core::log::{EventLog, StoredEvent};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

/// PostgreSQL-backed durable append-only log.
///
/// The `events` table carries a uniqueness constraint on
/// `(stream_id, version)`; a violation surfaces as [`Error::Store`] with a
/// message the event store recognizes as the last-resort concurrency
/// guard.
#[derive(Debug, Clone)]
pub struct PgEventLog {
    pool: PgPool,
}

impl PgEventLog {
    /// Creates a new `PgEventLog` over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the events table and its indexes if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] on a database failure.
    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::raw_sql(crate::schema::CREATE_EVENTS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    fn decode_rows(rows: Vec<PgRow>) -> Result<Vec<StoredEvent>, Error> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(decode_row(&row)?);
        }
        Ok(out)
    }
}

fn store_error(error: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &error {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return Error::Store(format!("unique constraint violation: {db}"));
        }
    }
    Error::Store(error.to_string())
}

fn decode_row(row: &PgRow) -> Result<StoredEvent, Error> {
    let payload: sqlx::types::Json<serde_json::Value> =
        row.try_get("payload").map_err(store_error)?;
    Ok(StoredEvent {
        event_id: row.try_get("event_id").map_err(store_error)?,
        stream_id: row.try_get("stream_id").map_err(store_error)?,
        event_type: row.try_get("event_type").map_err(store_error)?,
        payload: payload.0,
        version: row.try_get("version").map_err(store_error)?,
        schema_version: row.try_get("schema_version").map_err(store_error)?,
        correlation_id: row.try_get("correlation_id").map_err(store_error)?,
        causation_id: row.try_get("causation_id").map_err(store_error)?,
        occurred_at: row.try_get("occurred_at").map_err(store_error)?,
    })
}

const SELECT_COLUMNS: &str = "SELECT event_id, stream_id, event_type, payload, version, \
     schema_version, correlation_id, causation_id, occurred_at FROM events";

#[async_trait]
impl EventLog for PgEventLog {
    async fn append(&self, events: &[StoredEvent]) -> Result<(), Error> {
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO events (event_id, stream_id, event_type, payload, version, \
             schema_version, correlation_id, causation_id, occurred_at) ",
        );
        qb.push_values(events, |mut b, event| {
            b.push_bind(event.event_id);
            b.push_bind(event.stream_id);
            b.push_bind(&event.event_type);
            b.push_bind(sqlx::types::Json(&event.payload));
            b.push_bind(event.version);
            b.push_bind(event.schema_version);
            b.push_bind(event.correlation_id);
            b.push_bind(event.causation_id);
            b.push_bind(event.occurred_at);
        });

        qb.build().execute(&mut *tx).await.map_err(store_error)?;
        tx.commit().await.map_err(store_error)?;

        tracing::debug!(count = events.len(), "appended events");
        Ok(())
    }

    async fn max_version(&self, stream_id: Uuid) -> Result<Option<i64>, Error> {
        sqlx::query_scalar("SELECT MAX(version) FROM events WHERE stream_id = $1")
            .bind(stream_id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn events(&self, stream_id: Uuid) -> Result<Vec<StoredEvent>, Error> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE stream_id = $1 ORDER BY version ASC"
        ))
        .bind(stream_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        Self::decode_rows(rows)
    }

    async fn events_from(
        &self,
        stream_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, Error> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE stream_id = $1 AND version >= $2 ORDER BY version ASC"
        ))
        .bind(stream_id)
        .bind(from_version)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        Self::decode_rows(rows)
    }

    async fn all_events(&self, offset: i64, limit: i64) -> Result<Vec<StoredEvent>, Error> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} ORDER BY occurred_at ASC, version ASC OFFSET $1 LIMIT $2"
        ))
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        Self::decode_rows(rows)
    }

    async fn all_events_from(&self, from_version: i64) -> Result<Vec<StoredEvent>, Error> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE version >= $1 ORDER BY occurred_at ASC, version ASC"
        ))
        .bind(from_version)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        Self::decode_rows(rows)
    }
}
