//! Create User Handler
//!
//! Runs the full command pipeline for user creation: load (trivially
//! empty here), decide, append, project, dispatch — all inside one unit
//! of work.

use uuid::Uuid;

use crate::aggregate::{Aggregate, User};
use crate::dispatch::{dispatch_in_tx, DispatchMode};
use crate::domain::AggregateType;
use crate::error::{AppError, AppResult};
use crate::event_store::EventStore;
use crate::projection::EmailProvider;
use crate::read_model::ReadModel;
use crate::snapshot::SnapshotStore;
use crate::uow::UnitOfWork;

use super::commands::{CreateUserCommand, CreateUserResult};
use super::loader::load_user;

pub struct CreateUserHandler<E: EmailProvider> {
    pool: sqlx::PgPool,
    event_store: EventStore,
    snapshot_store: SnapshotStore,
    read_model: ReadModel,
    dispatch_mode: DispatchMode,
    email: E,
}

impl<E: EmailProvider> CreateUserHandler<E> {
    pub fn new(pool: sqlx::PgPool, dispatch_mode: DispatchMode, email: E) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            snapshot_store: SnapshotStore::new(pool.clone()),
            read_model: ReadModel::new(pool.clone()),
            pool,
            dispatch_mode,
            email,
        }
    }

    pub async fn execute(&self, command: CreateUserCommand) -> AppResult<CreateUserResult> {
        if load_user(&self.event_store, &self.snapshot_store, command.user_id)
            .await?
            .is_some()
        {
            return Err(AppError::Domain(crate::domain::DomainError::UserAlreadyExists {
                field: "id".to_string(),
                value: command.user_id.to_string(),
            }));
        }

        if let Some((field, value)) = self
            .read_model
            .conflicting_field(&command.username, &command.email)
            .await?
        {
            return Err(AppError::Domain(crate::domain::DomainError::UserAlreadyExists {
                field: field.to_string(),
                value,
            }));
        }

        let mut user = User::default();
        let event = user.create_user(
            command.user_id,
            command.username.clone(),
            command.email,
            command.first_name,
            command.last_name,
            command.password_hash,
            command.hashing_method,
            command.role,
        )?;

        let event_id = Uuid::new_v4();
        let mut uow = UnitOfWork::begin(&self.pool).await.map_err(AppError::Database)?;

        let stored = self
            .event_store
            .append_to_stream(
                uow.transaction(),
                event_id,
                user.id(),
                AggregateType::User,
                0,
                &event,
            )
            .await?;

        dispatch_in_tx(self.dispatch_mode, uow.transaction(), &stored, &self.email).await?;

        if user.should_snapshot() {
            self.snapshot_store
                .set(uow.transaction(), User::aggregate_type(), user.id(), user.version(), &user)
                .await?;
        }

        uow.commit().await.map_err(AppError::Database)?;

        Ok(CreateUserResult {
            user_id: command.user_id,
            username: command.username,
            created_at: user.created_at().unwrap_or_else(chrono::Utc::now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_command_builds() {
        let cmd = CreateUserCommand {
            user_id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            first_name: "Alice".into(),
            last_name: "Smith".into(),
            password_hash: "hash".into(),
            hashing_method: "bcrypt".into(),
            role: "member".into(),
        };
        assert_eq!(cmd.username, "alice");
    }
}
