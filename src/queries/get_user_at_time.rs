//! GetUserAtTime query
//!
//! Reconstructs user state as of a point in time by replaying the event
//! stream directly, bypassing the read model entirely — the read model
//! only ever holds current state. A user whose first event postdates
//! `as_of` didn't exist yet at that point, and this returns `None` rather
//! than a zeroed-out aggregate.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregate::{Aggregate, User};
use crate::event_store::EventStore;

pub struct GetUserAtTimeQuery {
    event_store: EventStore,
}

impl GetUserAtTimeQuery {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            event_store: EventStore::new(pool),
        }
    }

    pub async fn execute(
        &self,
        user_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<Option<User>, crate::event_store::EventStoreError> {
        let events = self.event_store.get_stream_as_of(user_id, as_of).await?;
        if events.is_empty() {
            return Ok(None);
        }

        let mut user = User::default();
        for stored in events {
            user.apply(stored.event);
        }

        Ok(Some(user))
    }
}
