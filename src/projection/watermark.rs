//! Projection Watermarks
//!
//! Tracks, per aggregate, the highest event revision already folded into
//! the read model. Synchronous dispatch always applies revisions in order
//! (the projection runs in the same transaction as the append), but
//! asynchronous dispatch delivers at least once and not necessarily in
//! order — a retried `PASSWORD_CHANGED` task can be picked up before the
//! `USER_CREATED` task that logically precedes it. Gating every apply on
//! the watermark turns "at least once, any order" into "exactly once,
//! in order" from the read model's point of view.

use sqlx::{PgExecutor, Postgres, Transaction};
use uuid::Uuid;

use super::ProjectionError;

#[derive(Debug, Clone)]
pub struct ProjectionWatermarks;

impl ProjectionWatermarks {
    /// Highest revision already applied for `aggregate_id`, or 0 if none.
    pub async fn current<'e, E>(executor: E, aggregate_id: Uuid) -> Result<i64, ProjectionError>
    where
        E: PgExecutor<'e>,
    {
        let revision: Option<i64> = sqlx::query_scalar(
            "SELECT revision FROM projection_watermarks WHERE aggregate_id = $1",
        )
        .bind(aggregate_id)
        .fetch_optional(executor)
        .await?;

        Ok(revision.unwrap_or(0))
    }

    /// Advance the watermark to `revision`. Guarded so an out-of-order or
    /// duplicate apply can never move it backwards.
    pub async fn advance(
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: Uuid,
        revision: i64,
    ) -> Result<(), ProjectionError> {
        sqlx::query(
            r#"
            INSERT INTO projection_watermarks (aggregate_id, revision)
            VALUES ($1, $2)
            ON CONFLICT (aggregate_id)
            DO UPDATE SET revision = $2
            WHERE projection_watermarks.revision < $2
            "#,
        )
        .bind(aggregate_id)
        .bind(revision)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
