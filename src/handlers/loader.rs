//! Shared aggregate loading for command handlers
//!
//! Reconstructs a `User` aggregate from the latest snapshot (if any)
//! forward through the remaining events in its stream. A user with no
//! snapshot and no events simply doesn't exist yet.

use uuid::Uuid;

use crate::aggregate::{Aggregate, User};
use crate::error::AppError;
use crate::event_store::EventStore;
use crate::snapshot::SnapshotStore;

pub async fn load_user(
    event_store: &EventStore,
    snapshot_store: &SnapshotStore,
    user_id: Uuid,
) -> Result<Option<User>, AppError> {
    let snapshot = snapshot_store.get::<User>(User::aggregate_type(), user_id).await?;

    let (mut user, from_revision) = match snapshot {
        Some(snap) => (snap.state, snap.revision),
        None => (User::default(), 0),
    };

    let events = event_store.get_stream_after(user_id, from_revision).await?;

    if from_revision == 0 && events.is_empty() {
        return Ok(None);
    }

    for stored in events {
        user.apply(stored.event);
    }

    Ok(Some(user))
}
