//! Domain Events
//!
//! Event definitions for Event Sourcing. Events are immutable facts that
//! have happened in the system. `event_type` (kind) and `version` are
//! stored as separate fields rather than baked into a payload class name,
//! so that old versions stay deserializable forever and a registry can
//! dispatch on `(kind, version)` (see `event_store::deserializer`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed enumeration of aggregate kinds. The event store and snapshot
/// store are partitioned per aggregate type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregateType {
    User,
}

impl AggregateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateType::User => "USER",
        }
    }
}

impl std::fmt::Display for AggregateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed enumeration of event kinds for the user aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    UserCreated,
    UserUpdated,
    UserDeleted,
    PasswordChanged,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::UserCreated => "USER_CREATED",
            EventKind::UserUpdated => "USER_UPDATED",
            EventKind::UserDeleted => "USER_DELETED",
            EventKind::PasswordChanged => "PASSWORD_CHANGED",
        }
    }

    /// Parse the persisted string form back into a kind. Unknown kinds are
    /// a fatal deserialization error at the call site, never silently
    /// coerced.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER_CREATED" => Some(EventKind::UserCreated),
            "USER_UPDATED" => Some(EventKind::UserUpdated),
            "USER_DELETED" => Some(EventKind::UserDeleted),
            "PASSWORD_CHANGED" => Some(EventKind::PasswordChanged),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait implemented by every versioned payload type. The version is a
/// monotonically increasing string per event kind (`"1"`, `"2"`, ...).
pub trait EventPayload {
    const KIND: EventKind;
    const VERSION: &'static str;
}

/// Payload for `USER_CREATED`, schema version 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreatedV1 {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub hashing_method: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl EventPayload for UserCreatedV1 {
    const KIND: EventKind = EventKind::UserCreated;
    const VERSION: &'static str = "1";
}

/// Fields a profile update may change. `username` is carried here rather
/// than as its own event kind, keeping the closed `EventKind` enumeration
/// intact while still covering the original implementation's username
/// change capability (see SPEC_FULL.md §3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
    }
}

/// Payload for `USER_UPDATED`, schema version 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdatedV1 {
    pub user_id: Uuid,
    pub changes: UserChanges,
    pub updated_at: DateTime<Utc>,
}

impl EventPayload for UserUpdatedV1 {
    const KIND: EventKind = EventKind::UserUpdated;
    const VERSION: &'static str = "1";
}

/// Payload for `USER_DELETED`, schema version 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDeletedV1 {
    pub user_id: Uuid,
    pub deleted_at: DateTime<Utc>,
}

impl EventPayload for UserDeletedV1 {
    const KIND: EventKind = EventKind::UserDeleted;
    const VERSION: &'static str = "1";
}

/// Payload for `PASSWORD_CHANGED`, schema version 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordChangedV1 {
    pub user_id: Uuid,
    pub password_hash: String,
    pub hashing_method: String,
    pub changed_at: DateTime<Utc>,
}

impl EventPayload for PasswordChangedV1 {
    const KIND: EventKind = EventKind::PasswordChanged;
    const VERSION: &'static str = "1";
}

/// In-memory typed event, produced by aggregate intent methods and
/// consumed by `apply`. Carries its own kind/version so the event store
/// can persist `(kind, version, payload)` as separate columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UserEvent {
    UserCreated(UserCreatedV1),
    UserUpdated(UserUpdatedV1),
    UserDeleted(UserDeletedV1),
    PasswordChanged(PasswordChangedV1),
}

impl UserEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            UserEvent::UserCreated(_) => EventKind::UserCreated,
            UserEvent::UserUpdated(_) => EventKind::UserUpdated,
            UserEvent::UserDeleted(_) => EventKind::UserDeleted,
            UserEvent::PasswordChanged(_) => EventKind::PasswordChanged,
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            UserEvent::UserCreated(_) => UserCreatedV1::VERSION,
            UserEvent::UserUpdated(_) => UserUpdatedV1::VERSION,
            UserEvent::UserDeleted(_) => UserDeletedV1::VERSION,
            UserEvent::PasswordChanged(_) => PasswordChangedV1::VERSION,
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            UserEvent::UserCreated(e) => e.user_id,
            UserEvent::UserUpdated(e) => e.user_id,
            UserEvent::UserDeleted(e) => e.user_id,
            UserEvent::PasswordChanged(e) => e.user_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::UserCreated(e) => e.created_at,
            UserEvent::UserUpdated(e) => e.updated_at,
            UserEvent::UserDeleted(e) => e.deleted_at,
            UserEvent::PasswordChanged(e) => e.changed_at,
        }
    }

    /// Serialize just the payload (without the `type` tag) for storage in
    /// the `events.payload` JSON column, which keeps `event_kind` and
    /// `version` as their own persisted columns instead of duplicating
    /// them inside the JSON blob.
    pub fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            UserEvent::UserCreated(e) => serde_json::to_value(e),
            UserEvent::UserUpdated(e) => serde_json::to_value(e),
            UserEvent::UserDeleted(e) => serde_json::to_value(e),
            UserEvent::PasswordChanged(e) => serde_json::to_value(e),
        }
    }
}

/// A row as read back from the event store, with the envelope fields
/// (id, revision, timestamp) alongside the deserialized typed event.
/// `Serialize`/`Deserialize` let this travel whole through the async
/// dispatch outbox (`projection_tasks.event_payload_serialized`) without a
/// second trip to the `events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: AggregateType,
    pub kind: EventKind,
    pub version: String,
    pub revision: i64,
    pub occurred_at: DateTime<Utc>,
    pub event: UserEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_round_trips_through_string_form() {
        for kind in [
            EventKind::UserCreated,
            EventKind::UserUpdated,
            EventKind::UserDeleted,
            EventKind::PasswordChanged,
        ] {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn unknown_event_kind_does_not_parse() {
        assert_eq!(EventKind::parse("NOT_A_KIND"), None);
    }

    #[test]
    fn user_changes_is_empty_when_no_field_set() {
        assert!(UserChanges::default().is_empty());
        assert!(!UserChanges {
            email: Some("a@b.com".into()),
            ..Default::default()
        }
        .is_empty());
    }
}
