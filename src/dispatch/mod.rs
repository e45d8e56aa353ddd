//! Event Dispatcher
//!
//! Routes a persisted event to the projections registered for its kind.
//! Two delivery modes share the same routing table (`route_for`):
//!
//! - **Sync** (`SyncDispatcher`): runs in the same transaction as the
//!   event append. A projection failure rolls back the whole command.
//! - **Async** (`AsyncDispatcher` + `ProjectionWorker`): the append
//!   transaction enqueues a durable task; a worker polls and applies it
//!   out-of-band. Delivery is at least once; `UserProjection`'s revision
//!   watermark makes repeated or out-of-order delivery exactly-once
//!   effective.
//!
//! Which mode is active is an operational choice (`SYNC_EVENT_HANDLER`,
//! see `Config`), not a per-event one.

mod async_queue;
mod sync;
mod worker;

pub use async_queue::AsyncDispatcher;
pub use sync::SyncDispatcher;
pub use worker::ProjectionWorker;

/// Dispatch `stored_event` according to `mode`, within the command's own
/// transaction. In `Async` mode this only enqueues — the actual
/// projection runs later on `ProjectionWorker`.
pub async fn dispatch_in_tx(
    mode: DispatchMode,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    stored_event: &crate::domain::StoredEvent,
    email: &impl crate::projection::EmailProvider,
) -> Result<(), DispatchError> {
    match mode {
        DispatchMode::Sync => {
            SyncDispatcher::dispatch_in_tx(tx, stored_event, email).await?;
        }
        DispatchMode::Async => {
            AsyncDispatcher::enqueue_in_tx(tx, stored_event).await?;
        }
    }
    Ok(())
}

use crate::domain::EventKind;
use crate::projection::{EmailError, ProjectionError};

/// Errors a dispatch attempt can raise. In sync mode these bubble up and
/// roll back the command's transaction; in async mode they're caught per
/// task by the worker and recorded against that task's attempt count.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which delivery mode a deployment runs. Set once at startup from
/// `SYNC_EVENT_HANDLER`; not a per-command choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Sync,
    Async,
}

/// Projection kinds a routed event can fan out to. Mirrors the persisted
/// `projection_type` column on `projection_tasks` for the async path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionTarget {
    UserReadModel,
    WelcomeEmail,
}

impl ProjectionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectionTarget::UserReadModel => "USER_READ_MODEL",
            ProjectionTarget::WelcomeEmail => "WELCOME_EMAIL",
        }
    }
}

/// Static routing table: which projections run for each event kind. The
/// read model projection runs for every kind; `WelcomeEmail` only for
/// `USER_CREATED`.
pub fn route_for(kind: EventKind) -> &'static [ProjectionTarget] {
    match kind {
        EventKind::UserCreated => &[ProjectionTarget::UserReadModel, ProjectionTarget::WelcomeEmail],
        EventKind::UserUpdated => &[ProjectionTarget::UserReadModel],
        EventKind::UserDeleted => &[ProjectionTarget::UserReadModel],
        EventKind::PasswordChanged => &[ProjectionTarget::UserReadModel],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_created_routes_to_read_model_and_email() {
        let targets = route_for(EventKind::UserCreated);
        assert!(targets.contains(&ProjectionTarget::UserReadModel));
        assert!(targets.contains(&ProjectionTarget::WelcomeEmail));
    }

    #[test]
    fn password_changed_routes_only_to_read_model() {
        let targets = route_for(EventKind::PasswordChanged);
        assert_eq!(targets, &[ProjectionTarget::UserReadModel]);
    }
}
