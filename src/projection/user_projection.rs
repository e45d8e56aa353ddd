//! User Projection
//!
//! Folds `UserEvent`s into the `users` read-model table, gated by the
//! revision watermark so at-least-once, possibly out-of-order delivery
//! still produces an exactly-once-effective, in-order result.

use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{StoredEvent, UserEvent};

use super::watermark::ProjectionWatermarks;
use super::ProjectionError;

/// What happened when a projection tried to apply an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionOutcome {
    /// The event extended the watermark and the read model was updated.
    Applied,
    /// The event's revision is at or below the current watermark — it was
    /// already applied by a previous delivery attempt.
    AlreadyApplied,
    /// The event's revision is ahead of the watermark by more than one —
    /// its predecessor hasn't landed yet. The caller should retry later.
    Deferred,
}

#[derive(Debug, Clone)]
pub struct UserProjection {
    pool: PgPool,
}

impl UserProjection {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply `stored_event` in its own transaction. Used by the async
    /// dispatch worker, where each task commits independently.
    pub async fn apply(&self, stored_event: &StoredEvent) -> Result<ProjectionOutcome, ProjectionError> {
        let mut tx = self.pool.begin().await?;
        let outcome = Self::apply_in_tx(&mut tx, stored_event).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Apply `stored_event` as part of an already-open transaction. Used
    /// by synchronous dispatch, where the projection commits atomically
    /// with the event append it's projecting.
    pub async fn apply_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        stored_event: &StoredEvent,
    ) -> Result<ProjectionOutcome, ProjectionError> {
        let watermark = ProjectionWatermarks::current(&mut **tx, stored_event.aggregate_id).await?;

        if stored_event.revision <= watermark {
            return Ok(ProjectionOutcome::AlreadyApplied);
        }
        if stored_event.revision > watermark + 1 {
            return Ok(ProjectionOutcome::Deferred);
        }

        match &stored_event.event {
            UserEvent::UserCreated(e) => {
                sqlx::query(
                    r#"
                    INSERT INTO users (
                        id, username, email, first_name, last_name,
                        password_hash, hashing_method, role, created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(e.user_id)
                .bind(&e.username)
                .bind(&e.email)
                .bind(&e.first_name)
                .bind(&e.last_name)
                .bind(&e.password_hash)
                .bind(&e.hashing_method)
                .bind(&e.role)
                .bind(e.created_at)
                .execute(&mut **tx)
                .await?;
            }
            UserEvent::UserUpdated(e) => {
                sqlx::query(
                    r#"
                    UPDATE users
                    SET username = COALESCE($2, username),
                        first_name = COALESCE($3, first_name),
                        last_name = COALESCE($4, last_name),
                        email = COALESCE($5, email),
                        updated_at = $6
                    WHERE id = $1
                    "#,
                )
                .bind(e.user_id)
                .bind(&e.changes.username)
                .bind(&e.changes.first_name)
                .bind(&e.changes.last_name)
                .bind(&e.changes.email)
                .bind(e.updated_at)
                .execute(&mut **tx)
                .await?;
            }
            UserEvent::PasswordChanged(e) => {
                sqlx::query(
                    "UPDATE users SET password_hash = $2, hashing_method = $3, updated_at = $4 WHERE id = $1",
                )
                .bind(e.user_id)
                .bind(&e.password_hash)
                .bind(&e.hashing_method)
                .bind(e.changed_at)
                .execute(&mut **tx)
                .await?;
            }
            UserEvent::UserDeleted(e) => {
                sqlx::query("UPDATE users SET deleted_at = $2, updated_at = $2 WHERE id = $1")
                    .bind(e.user_id)
                    .bind(e.deleted_at)
                    .execute(&mut **tx)
                    .await?;
            }
        }

        ProjectionWatermarks::advance(tx, stored_event.aggregate_id, stored_event.revision).await?;

        Ok(ProjectionOutcome::Applied)
    }
}
