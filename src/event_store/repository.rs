//! Event Store Repository
//!
//! Core implementation of the Event Store pattern: append-only persistence
//! with optimistic concurrency control on `(aggregate_id, revision)`, and
//! point-in-time stream reconstruction.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::{AggregateType, StoredEvent, UserEvent};

use super::deserializer::deserialize_event;
use super::EventStoreError;

/// A predicate for `search_events`. All `Some` fields are ANDed together.
#[derive(Debug, Default, Clone)]
pub struct EventSearch {
    pub aggregate_id: Option<Uuid>,
    pub aggregate_type: Option<AggregateType>,
    pub kind: Option<crate::domain::EventKind>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// Safety cap on rows returned by `search_events` when the caller doesn't
/// supply a tighter limit.
const MAX_SEARCH_LIMIT: i64 = 1000;

fn row_to_stored_event(row: sqlx::postgres::PgRow) -> Result<StoredEvent, EventStoreError> {
    let id: Uuid = row.try_get("id")?;
    let aggregate_id: Uuid = row.try_get("aggregate_id")?;
    let aggregate_type_str: String = row.try_get("aggregate_type")?;
    let kind_str: String = row.try_get("event_kind")?;
    let version: String = row.try_get("event_version")?;
    let revision: i64 = row.try_get("revision")?;
    let occurred_at: DateTime<Utc> = row.try_get("occurred_at")?;
    let payload: serde_json::Value = row.try_get("payload")?;

    let aggregate_type = match aggregate_type_str.as_str() {
        "USER" => AggregateType::User,
        other => return Err(EventStoreError::UnrecognizedEventKind(other.to_string())),
    };
    let kind = crate::domain::EventKind::parse(&kind_str)
        .ok_or_else(|| EventStoreError::UnrecognizedEventKind(kind_str.clone()))?;
    let event = deserialize_event(&kind_str, &version, &payload)?;

    Ok(StoredEvent {
        id,
        aggregate_id,
        aggregate_type,
        kind,
        version,
        revision,
        occurred_at,
        event,
    })
}

/// Event Store for persisting and retrieving events.
#[derive(Debug, Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a single event to an aggregate's stream within `tx`.
    ///
    /// Single attempt, no internal retry: the caller's unit of work owns
    /// retry/rollback policy. `event_id` is caller-supplied so a retried
    /// command (same event id) is a no-op rather than a duplicate append.
    pub async fn append_to_stream(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event_id: Uuid,
        aggregate_id: Uuid,
        aggregate_type: AggregateType,
        expected_revision: i64,
        event: &UserEvent,
    ) -> Result<StoredEvent, EventStoreError> {
        if let Some(existing) = self.find_by_id(&mut **tx, event_id).await? {
            return Ok(existing);
        }

        let current_revision = self.current_revision(&mut **tx, aggregate_id).await?;
        if current_revision != expected_revision {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_revision,
                actual: current_revision,
            });
        }

        let revision = expected_revision + 1;
        let payload = event.payload_json()?;
        let occurred_at = event.occurred_at();

        let row = sqlx::query(
            r#"
            INSERT INTO events (
                id, aggregate_id, aggregate_type, event_kind, event_version,
                revision, occurred_at, payload
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, aggregate_id, aggregate_type, event_kind, event_version,
                      revision, occurred_at, payload
            "#,
        )
        .bind(event_id)
        .bind(aggregate_id)
        .bind(aggregate_type.as_str())
        .bind(event.kind().as_str())
        .bind(event.version())
        .bind(revision)
        .bind(occurred_at)
        .bind(&payload)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected: expected_revision,
                    actual: revision,
                }
            } else {
                EventStoreError::Database(e)
            }
        })?;

        row_to_stored_event(row)
    }

    /// Fetch the full stream for an aggregate, ordered by revision.
    pub async fn get_stream(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, aggregate_type, event_kind, event_version,
                   revision, occurred_at, payload
            FROM events
            WHERE aggregate_id = $1
            ORDER BY revision ASC
            "#,
        )
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_stored_event).collect()
    }

    /// Fetch the stream for an aggregate up to and including `as_of`,
    /// ordered by revision. Used for point-in-time reconstruction.
    pub async fn get_stream_as_of(
        &self,
        aggregate_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, aggregate_type, event_kind, event_version,
                   revision, occurred_at, payload
            FROM events
            WHERE aggregate_id = $1 AND occurred_at <= $2
            ORDER BY revision ASC
            "#,
        )
        .bind(aggregate_id)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_stored_event).collect()
    }

    /// Fetch events after a given revision (for loading from a snapshot
    /// watermark forward).
    pub async fn get_stream_after(
        &self,
        aggregate_id: Uuid,
        after_revision: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, aggregate_type, event_kind, event_version,
                   revision, occurred_at, payload
            FROM events
            WHERE aggregate_id = $1 AND revision > $2
            ORDER BY revision ASC
            "#,
        )
        .bind(aggregate_id)
        .bind(after_revision)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_stored_event).collect()
    }

    /// Search across the event store by predicate. `limit` is capped at
    /// `MAX_SEARCH_LIMIT` regardless of what the caller asks for.
    pub async fn search_events(
        &self,
        search: &EventSearch,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let limit = search
            .limit
            .unwrap_or(MAX_SEARCH_LIMIT)
            .min(MAX_SEARCH_LIMIT);

        let mut query = sqlx::QueryBuilder::new(
            "SELECT id, aggregate_id, aggregate_type, event_kind, event_version, \
             revision, occurred_at, payload FROM events WHERE 1 = 1",
        );

        if let Some(aggregate_id) = search.aggregate_id {
            query.push(" AND aggregate_id = ").push_bind(aggregate_id);
        }
        if let Some(aggregate_type) = search.aggregate_type {
            query
                .push(" AND aggregate_type = ")
                .push_bind(aggregate_type.as_str());
        }
        if let Some(kind) = search.kind {
            query.push(" AND event_kind = ").push_bind(kind.as_str());
        }
        if let Some(after) = search.occurred_after {
            query.push(" AND occurred_at >= ").push_bind(after);
        }
        if let Some(before) = search.occurred_before {
            query.push(" AND occurred_at <= ").push_bind(before);
        }
        query.push(" ORDER BY occurred_at DESC LIMIT ").push_bind(limit);

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_stored_event).collect()
    }

    /// Current highest revision for an aggregate, or 0 if it has no events.
    async fn current_revision<'e, E>(&self, executor: E, aggregate_id: Uuid) -> Result<i64, EventStoreError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let revision: Option<i64> =
            sqlx::query_scalar("SELECT MAX(revision) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id)
                .fetch_one(executor)
                .await?;
        Ok(revision.unwrap_or(0))
    }

    async fn find_by_id<'e, E>(
        &self,
        executor: E,
        event_id: Uuid,
    ) -> Result<Option<StoredEvent>, EventStoreError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query(
            r#"
            SELECT id, aggregate_id, aggregate_type, event_kind, event_version,
                   revision, occurred_at, payload
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(executor)
        .await?;

        row.map(row_to_stored_event).transpose()
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}
