//! Snapshot Store Repository

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::SnapshotError;

/// A snapshot row as read back from storage, generic over the aggregate
/// state type.
#[derive(Debug, Clone)]
pub struct Snapshot<A> {
    pub revision: i64,
    pub state: A,
    pub taken_at: DateTime<Utc>,
}

/// Snapshot Store for persisting and retrieving aggregate snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    pool: PgPool,
}

impl SnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Write (or overwrite) the snapshot for `(aggregate_type, aggregate_id)`
    /// inside `tx`, so the write commits atomically with whatever event
    /// append and projection the caller's unit of work also did. A
    /// snapshot at a lower revision than the one already stored is
    /// rejected by the upsert's `WHERE` guard, so a slow writer racing a
    /// fast one can't regress the snapshot.
    pub async fn set<A>(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        aggregate_type: &str,
        aggregate_id: Uuid,
        revision: i64,
        state: &A,
    ) -> Result<(), SnapshotError>
    where
        A: Serialize,
    {
        let state_json = serde_json::to_value(state)?;

        sqlx::query(
            r#"
            INSERT INTO event_snapshots (aggregate_type, aggregate_id, revision, state, taken_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (aggregate_type, aggregate_id)
            DO UPDATE SET revision = $3, state = $4, taken_at = NOW()
            WHERE event_snapshots.revision < $3
            "#,
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .bind(revision)
        .bind(state_json)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Read the snapshot for `(aggregate_type, aggregate_id)`, if any.
    pub async fn get<A>(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<Snapshot<A>>, SnapshotError>
    where
        A: DeserializeOwned,
    {
        let row: Option<(i64, serde_json::Value, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT revision, state, taken_at
            FROM event_snapshots
            WHERE aggregate_type = $1 AND aggregate_id = $2
            "#,
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((revision, state, taken_at)) => {
                let state: A = serde_json::from_value(state)?;
                Ok(Some(Snapshot {
                    revision,
                    state,
                    taken_at,
                }))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    // Snapshot round-tripping is exercised end-to-end in
    // tests/integration_event_store.rs against a real database; these
    // unit tests stay confined to what doesn't need one.
}
