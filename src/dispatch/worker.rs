//! Projection Worker
//!
//! Polls `projection_tasks` for pending work and applies it. `FOR UPDATE
//! SKIP LOCKED` lets multiple worker instances run against the same table
//! without contending on the same row, the same idiom used for polling
//! queues built directly on Postgres.

use std::time::Duration;

use sqlx::PgPool;
use tokio::time::interval;
use uuid::Uuid;

use crate::domain::{StoredEvent, UserEvent};
use crate::projection::{EmailProvider, ProjectionOutcome, UserProjection};

use super::DispatchError;

const MAX_ATTEMPTS: i32 = 10;
/// Delay applied to a task whose predecessor hasn't projected yet, or that
/// just failed — gives the rest of the stream time to catch up.
const RETRY_DELAY: Duration = Duration::from_secs(5);

struct TaskRow {
    id: Uuid,
    projection_type: String,
    event_payload_serialized: serde_json::Value,
    attempts: i32,
}

pub struct ProjectionWorker<E: EmailProvider> {
    pool: PgPool,
    projection: UserProjection,
    email: E,
    poll_interval: Duration,
}

impl<E: EmailProvider> ProjectionWorker<E> {
    pub fn new(pool: PgPool, email: E) -> Self {
        Self {
            projection: UserProjection::new(pool.clone()),
            pool,
            email,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run the poll loop forever. Spawn this as a background task.
    pub async fn run(self) {
        let mut ticker = interval(self.poll_interval);
        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(tasks_processed = n, "projection worker tick"),
                Err(e) => tracing::error!(error = %e, "projection worker tick failed"),
            }
        }
    }

    /// Process every currently-available task once. Returns the number of
    /// tasks processed (successfully or not).
    pub async fn poll_once(&self) -> Result<usize, DispatchError> {
        let mut processed = 0;
        while let Some(task) = self.claim_next().await? {
            self.process(task).await?;
            processed += 1;
        }
        Ok(processed)
    }

    async fn claim_next(&self) -> Result<Option<TaskRow>, DispatchError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(Uuid, String, serde_json::Value, i32)> = sqlx::query_as(
            r#"
            SELECT id, projection_type, event_payload_serialized, attempts
            FROM projection_tasks
            WHERE status = 'pending' AND available_at <= NOW()
            ORDER BY available_at ASC
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id, projection_type, event_payload_serialized, attempts)) = row else {
            return Ok(None);
        };

        sqlx::query("UPDATE projection_tasks SET status = 'processing', claimed_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(TaskRow {
            id,
            projection_type,
            event_payload_serialized,
            attempts,
        }))
    }

    async fn process(&self, task: TaskRow) -> Result<(), DispatchError> {
        let stored_event: StoredEvent = match serde_json::from_value(task.event_payload_serialized) {
            Ok(e) => e,
            Err(e) => {
                self.fail(task.id, task.attempts, &e.to_string()).await?;
                return Ok(());
            }
        };

        let result = match task.projection_type.as_str() {
            "USER_READ_MODEL" => self
                .projection
                .apply(&stored_event)
                .await
                .map_err(DispatchError::from),
            "WELCOME_EMAIL" => self.send_welcome_email(&stored_event).await,
            other => {
                tracing::warn!(projection_type = other, "unknown projection type, dropping task");
                self.complete(task.id).await?;
                return Ok(());
            }
        };

        match result {
            Ok(ProjectionOutcome::Applied) | Ok(ProjectionOutcome::AlreadyApplied) => {
                self.complete(task.id).await
            }
            Ok(ProjectionOutcome::Deferred) => self.defer(task.id).await,
            Err(e) => self.fail(task.id, task.attempts, &e.to_string()).await,
        }
    }

    async fn send_welcome_email(&self, stored_event: &StoredEvent) -> Result<ProjectionOutcome, DispatchError> {
        if let UserEvent::UserCreated(e) = &stored_event.event {
            self.email.send_welcome_email(&e.email, &e.username).await?;
        }
        Ok(ProjectionOutcome::Applied)
    }

    async fn complete(&self, task_id: Uuid) -> Result<(), DispatchError> {
        sqlx::query("UPDATE projection_tasks SET status = 'completed', completed_at = NOW() WHERE id = $1")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn defer(&self, task_id: Uuid) -> Result<(), DispatchError> {
        sqlx::query(
            r#"
            UPDATE projection_tasks
            SET status = 'pending', available_at = NOW() + $2
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .bind(RETRY_DELAY)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail(&self, task_id: Uuid, attempts: i32, error: &str) -> Result<(), DispatchError> {
        let attempts = attempts + 1;
        if attempts >= MAX_ATTEMPTS {
            tracing::error!(task_id = %task_id, error, "projection task exhausted retries, dead-lettering");
            sqlx::query(
                r#"
                UPDATE projection_tasks
                SET status = 'dead_letter', attempts = $2, last_error = $3, completed_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(task_id)
            .bind(attempts)
            .bind(error)
            .execute(&self.pool)
            .await?;
        } else {
            tracing::warn!(task_id = %task_id, attempts, error, "projection task failed, retrying");
            sqlx::query(
                r#"
                UPDATE projection_tasks
                SET status = 'pending', attempts = $2, available_at = NOW() + $3, last_error = $4
                WHERE id = $1
                "#,
            )
            .bind(task_id)
            .bind(attempts)
            .bind(RETRY_DELAY)
            .bind(error)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}
