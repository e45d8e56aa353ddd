//! Asynchronous dispatch — durable outbox
//!
//! Enqueues one row per routed projection target into `projection_tasks`
//! within the command's own transaction, so the enqueue is as atomic as
//! the event append it follows: either both land or neither does. A
//! separate `ProjectionWorker` polls this table and applies the tasks out
//! of band, which is what makes delivery durable across a process
//! restart.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::StoredEvent;

use super::{route_for, DispatchError};

pub struct AsyncDispatcher;

impl AsyncDispatcher {
    /// Enqueue a projection task for every target registered for this
    /// event's kind.
    pub async fn enqueue_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        stored_event: &StoredEvent,
    ) -> Result<(), DispatchError> {
        let payload = serde_json::to_value(stored_event)?;

        for target in route_for(stored_event.kind) {
            sqlx::query(
                r#"
                INSERT INTO projection_tasks (
                    id, task_name, aggregate_id, event_id, projection_type,
                    event_payload_serialized, status, attempts, available_at, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, 'pending', 0, NOW(), NOW())
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(format!("project_{}", target.as_str().to_lowercase()))
            .bind(stored_event.aggregate_id)
            .bind(stored_event.id)
            .bind(target.as_str())
            .bind(&payload)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}
