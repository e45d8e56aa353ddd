//! Synchronous dispatch
//!
//! Projects an event in the same transaction as the command that produced
//! it. Any projection failure propagates to the caller's unit of work,
//! which rolls back the event append along with it — the command either
//! fully lands (event + read model in sync) or leaves no trace.

use sqlx::{Postgres, Transaction};

use crate::domain::{StoredEvent, UserEvent};
use crate::projection::{EmailProvider, ProjectionOutcome, UserProjection};

use super::{route_for, DispatchError, ProjectionTarget};

pub struct SyncDispatcher;

impl SyncDispatcher {
    pub async fn dispatch_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        stored_event: &StoredEvent,
        email: &impl EmailProvider,
    ) -> Result<ProjectionOutcome, DispatchError> {
        let outcome = UserProjection::apply_in_tx(tx, stored_event).await?;

        if outcome == ProjectionOutcome::Applied {
            for target in route_for(stored_event.kind) {
                if *target == ProjectionTarget::WelcomeEmail {
                    if let UserEvent::UserCreated(e) = &stored_event.event {
                        email.send_welcome_email(&e.email, &e.username).await?;
                    }
                }
            }
        }

        Ok(outcome)
    }
}
