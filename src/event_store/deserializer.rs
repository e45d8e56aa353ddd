//! Event Deserializer Registry
//!
//! Maps a persisted `(event_kind, version)` pair back to a typed
//! `UserEvent`. Kind and version are stored as separate columns rather than
//! folded into a payload class name, so old payload shapes stay
//! deserializable even as new versions are added: a row written with
//! `version = "1"` years ago still resolves to `UserCreatedV1`.
//!
//! An unrecognized kind is a hard error — the kind enumeration is closed.
//! An unrecognized *version* of a known kind falls back to the latest
//! known version for that kind and logs a warning, rather than failing the
//! whole read: a minor forward-compat scheme a reader running slightly
//! behind a writer can tolerate.

use crate::domain::{
    EventKind, PasswordChangedV1, UserCreatedV1, UserDeletedV1, UserEvent, UserUpdatedV1,
};

use super::EventStoreError;

/// Latest known schema version for each event kind.
fn latest_version(kind: EventKind) -> &'static str {
    match kind {
        EventKind::UserCreated => "1",
        EventKind::UserUpdated => "1",
        EventKind::UserDeleted => "1",
        EventKind::PasswordChanged => "1",
    }
}

/// Deserialize a stored `(kind, version, payload)` triple into a `UserEvent`.
pub fn deserialize_event(
    kind_str: &str,
    version: &str,
    payload: &serde_json::Value,
) -> Result<UserEvent, EventStoreError> {
    let kind = EventKind::parse(kind_str)
        .ok_or_else(|| EventStoreError::UnrecognizedEventKind(kind_str.to_string()))?;

    let effective_version = if version == latest_version(kind) {
        version
    } else {
        tracing::warn!(
            kind = kind_str,
            version,
            latest = latest_version(kind),
            "unknown event schema version, falling back to latest known version"
        );
        latest_version(kind)
    };

    match (kind, effective_version) {
        (EventKind::UserCreated, "1") => {
            let p: UserCreatedV1 = serde_json::from_value(payload.clone())?;
            Ok(UserEvent::UserCreated(p))
        }
        (EventKind::UserUpdated, "1") => {
            let p: UserUpdatedV1 = serde_json::from_value(payload.clone())?;
            Ok(UserEvent::UserUpdated(p))
        }
        (EventKind::UserDeleted, "1") => {
            let p: UserDeletedV1 = serde_json::from_value(payload.clone())?;
            Ok(UserEvent::UserDeleted(p))
        }
        (EventKind::PasswordChanged, "1") => {
            let p: PasswordChangedV1 = serde_json::from_value(payload.clone())?;
            Ok(UserEvent::PasswordChanged(p))
        }
        (kind, version) => Err(EventStoreError::UnknownEventVersion {
            kind: kind.to_string(),
            version: version.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn round_trips_user_created_v1() {
        let payload = UserCreatedV1 {
            user_id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            first_name: "Alice".into(),
            last_name: "Smith".into(),
            password_hash: "hash".into(),
            hashing_method: "bcrypt".into(),
            role: "member".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        let event = deserialize_event("USER_CREATED", "1", &json).unwrap();
        assert!(matches!(event, UserEvent::UserCreated(_)));
    }

    #[test]
    fn unrecognized_kind_is_an_error() {
        let result = deserialize_event("NOT_A_KIND", "1", &serde_json::json!({}));
        assert!(matches!(
            result,
            Err(EventStoreError::UnrecognizedEventKind(_))
        ));
    }

    #[test]
    fn unknown_version_falls_back_to_latest() {
        let payload = UserDeletedV1 {
            user_id: Uuid::new_v4(),
            deleted_at: Utc::now(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        let event = deserialize_event("USER_DELETED", "99", &json).unwrap();
        assert!(matches!(event, UserEvent::UserDeleted(_)));
    }
}
