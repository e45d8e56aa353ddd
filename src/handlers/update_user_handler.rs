//! Update User Handler
//!
//! Handles user profile updates with event sourcing.

use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::dispatch::{dispatch_in_tx, DispatchMode};
use crate::domain::AggregateType;
use crate::error::{AppError, AppResult};
use crate::event_store::EventStore;
use crate::projection::EmailProvider;
use crate::snapshot::SnapshotStore;
use crate::uow::UnitOfWork;

use super::commands::{UpdateUserCommand, UpdateUserResult};
use super::loader::load_user;

pub struct UpdateUserHandler<E: EmailProvider> {
    pool: sqlx::PgPool,
    event_store: EventStore,
    snapshot_store: SnapshotStore,
    dispatch_mode: DispatchMode,
    email: E,
}

impl<E: EmailProvider> UpdateUserHandler<E> {
    pub fn new(pool: sqlx::PgPool, dispatch_mode: DispatchMode, email: E) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            snapshot_store: SnapshotStore::new(pool.clone()),
            pool,
            dispatch_mode,
            email,
        }
    }

    pub async fn execute(&self, command: UpdateUserCommand) -> AppResult<UpdateUserResult> {
        let mut user = load_user(&self.event_store, &self.snapshot_store, command.user_id)
            .await?
            .ok_or_else(|| AppError::Domain(crate::domain::DomainError::UserNotFound(command.user_id.to_string())))?;

        let expected_revision = user.version();
        let event = user.update_user(command.changes)?;

        let event_id = Uuid::new_v4();
        let mut uow = UnitOfWork::begin(&self.pool).await.map_err(AppError::Database)?;

        let stored = self
            .event_store
            .append_to_stream(
                uow.transaction(),
                event_id,
                user.id(),
                AggregateType::User,
                expected_revision,
                &event,
            )
            .await?;

        dispatch_in_tx(self.dispatch_mode, uow.transaction(), &stored, &self.email).await?;

        if user.should_snapshot() {
            self.snapshot_store
                .set(
                    uow.transaction(),
                    crate::aggregate::User::aggregate_type(),
                    user.id(),
                    user.version(),
                    &user,
                )
                .await?;
        }

        uow.commit().await.map_err(AppError::Database)?;

        Ok(UpdateUserResult {
            user_id: command.user_id,
            updated_at: user.updated_at().unwrap_or_else(chrono::Utc::now),
        })
    }
}
