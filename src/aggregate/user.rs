//! User Aggregate
//!
//! The aggregate root for the user management core. Intent methods
//! validate a command against the current state, build the resulting
//! event, and immediately fold it into `self` via `apply` so the
//! in-memory aggregate always reflects everything it has produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    DomainError, PasswordChangedV1, UserChanges, UserCreatedV1, UserDeletedV1, UserEvent,
    UserUpdatedV1,
};

use super::Aggregate;

/// Minimum accepted username length.
const MIN_USERNAME_LEN: usize = 3;

fn is_valid_email(email: &str) -> bool {
    email.contains('@')
}

/// The User aggregate root.
///
/// `exists` distinguishes "no events applied yet" from a user that has
/// actually been created, since `Default` must produce a valid zero value
/// without a revision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    id: Uuid,
    exists: bool,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    hashing_method: String,
    role: String,
    revision: i64,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Validate and create a new user, returning the `USER_CREATED` event.
    #[allow(clippy::too_many_arguments)]
    pub fn create_user(
        &mut self,
        user_id: Uuid,
        username: String,
        email: String,
        first_name: String,
        last_name: String,
        password_hash: String,
        hashing_method: String,
        role: String,
    ) -> Result<UserEvent, DomainError> {
        if self.exists {
            return Err(DomainError::UserAlreadyExists {
                field: "id".to_string(),
                value: self.id.to_string(),
            });
        }
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(DomainError::UsernameTooShort);
        }
        if !is_valid_email(&email) {
            return Err(DomainError::InvalidEmailFormat);
        }
        if password_hash.is_empty() {
            return Err(DomainError::PasswordRequired);
        }

        let event = UserEvent::UserCreated(UserCreatedV1 {
            user_id,
            username,
            email,
            first_name,
            last_name,
            password_hash,
            hashing_method,
            role,
            created_at: Utc::now(),
        });
        self.apply(event.clone());
        Ok(event)
    }

    /// Validate and apply a profile update, returning the `USER_UPDATED`
    /// event. At least one field must change.
    pub fn update_user(&mut self, changes: UserChanges) -> Result<UserEvent, DomainError> {
        if !self.exists {
            return Err(DomainError::UserNotFound(self.id.to_string()));
        }
        if self.deleted_at.is_some() {
            return Err(DomainError::CannotUpdateDeletedUser);
        }
        if changes.is_empty() {
            return Err(DomainError::NoFieldsToUpdate);
        }
        if let Some(username) = &changes.username {
            if username.chars().count() < MIN_USERNAME_LEN {
                return Err(DomainError::UsernameTooShort);
            }
        }
        if let Some(email) = &changes.email {
            if !is_valid_email(email) {
                return Err(DomainError::InvalidEmailFormat);
            }
        }

        let event = UserEvent::UserUpdated(UserUpdatedV1 {
            user_id: self.id,
            changes,
            updated_at: Utc::now(),
        });
        self.apply(event.clone());
        Ok(event)
    }

    /// Validate and apply a password change, returning the
    /// `PASSWORD_CHANGED` event. The new hash must differ from the current
    /// one (checked on the hash, since the core never sees plaintext).
    pub fn change_password(
        &mut self,
        password_hash: String,
        hashing_method: String,
    ) -> Result<UserEvent, DomainError> {
        if !self.exists {
            return Err(DomainError::UserNotFound(self.id.to_string()));
        }
        if self.deleted_at.is_some() {
            return Err(DomainError::CannotUpdateDeletedUser);
        }
        if password_hash.is_empty() {
            return Err(DomainError::PasswordRequired);
        }
        if password_hash == self.password_hash {
            return Err(DomainError::PasswordMustBeDifferent);
        }

        let event = UserEvent::PasswordChanged(PasswordChangedV1 {
            user_id: self.id,
            password_hash,
            hashing_method,
            changed_at: Utc::now(),
        });
        self.apply(event.clone());
        Ok(event)
    }

    /// Validate and apply a soft delete, returning the `USER_DELETED`
    /// event.
    pub fn delete_user(&mut self) -> Result<UserEvent, DomainError> {
        if !self.exists {
            return Err(DomainError::UserNotFound(self.id.to_string()));
        }
        if self.deleted_at.is_some() {
            return Err(DomainError::UserAlreadyDeleted);
        }

        let event = UserEvent::UserDeleted(UserDeletedV1 {
            user_id: self.id,
            deleted_at: Utc::now(),
        });
        self.apply(event.clone());
        Ok(event)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn hashing_method(&self) -> &str {
        &self.hashing_method
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl Aggregate for User {
    type Event = UserEvent;

    fn aggregate_type() -> &'static str {
        "USER"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.revision
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            UserEvent::UserCreated(e) => {
                self.id = e.user_id;
                self.exists = true;
                self.username = e.username;
                self.email = e.email;
                self.first_name = e.first_name;
                self.last_name = e.last_name;
                self.password_hash = e.password_hash;
                self.hashing_method = e.hashing_method;
                self.role = e.role;
                self.created_at = Some(e.created_at);
                self.updated_at = Some(e.created_at);
            }
            UserEvent::UserUpdated(e) => {
                if let Some(username) = e.changes.username {
                    self.username = username;
                }
                if let Some(first_name) = e.changes.first_name {
                    self.first_name = first_name;
                }
                if let Some(last_name) = e.changes.last_name {
                    self.last_name = last_name;
                }
                if let Some(email) = e.changes.email {
                    self.email = email;
                }
                self.updated_at = Some(e.updated_at);
            }
            UserEvent::PasswordChanged(e) => {
                self.password_hash = e.password_hash;
                self.hashing_method = e.hashing_method;
                self.updated_at = Some(e.changed_at);
            }
            UserEvent::UserDeleted(e) => {
                self.deleted_at = Some(e.deleted_at);
                self.updated_at = Some(e.deleted_at);
            }
        }
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> User {
        User::default()
    }

    #[test]
    fn create_user_populates_fields_and_bumps_revision() {
        let mut user = new_user();
        let id = Uuid::new_v4();
        let event = user
            .create_user(
                id,
                "alice".into(),
                "alice@example.com".into(),
                "Alice".into(),
                "Smith".into(),
                "hash".into(),
                "bcrypt".into(),
                "member".into(),
            )
            .unwrap();

        assert!(matches!(event, UserEvent::UserCreated(_)));
        assert_eq!(user.id(), id);
        assert_eq!(user.username(), "alice");
        assert_eq!(user.version(), 1);
        assert!(!user.is_deleted());
    }

    #[test]
    fn create_user_rejects_short_username() {
        let mut user = new_user();
        let result = user.create_user(
            Uuid::new_v4(),
            "ab".into(),
            "a@b.com".into(),
            "A".into(),
            "B".into(),
            "hash".into(),
            "bcrypt".into(),
            "member".into(),
        );
        assert_eq!(result, Err(DomainError::UsernameTooShort));
    }

    #[test]
    fn create_user_rejects_invalid_email() {
        let mut user = new_user();
        let result = user.create_user(
            Uuid::new_v4(),
            "alice".into(),
            "not-an-email".into(),
            "A".into(),
            "B".into(),
            "hash".into(),
            "bcrypt".into(),
            "member".into(),
        );
        assert_eq!(result, Err(DomainError::InvalidEmailFormat));
    }

    #[test]
    fn create_user_twice_conflicts() {
        let mut user = new_user();
        user.create_user(
            Uuid::new_v4(),
            "alice".into(),
            "alice@example.com".into(),
            "A".into(),
            "B".into(),
            "hash".into(),
            "bcrypt".into(),
            "member".into(),
        )
        .unwrap();

        let result = user.create_user(
            Uuid::new_v4(),
            "bob".into(),
            "bob@example.com".into(),
            "C".into(),
            "D".into(),
            "hash".into(),
            "bcrypt".into(),
            "member".into(),
        );
        assert!(matches!(result, Err(DomainError::UserAlreadyExists { .. })));
    }

    #[test]
    fn update_user_applies_partial_changes() {
        let mut user = new_user();
        user.create_user(
            Uuid::new_v4(),
            "alice".into(),
            "alice@example.com".into(),
            "Alice".into(),
            "Smith".into(),
            "hash".into(),
            "bcrypt".into(),
            "member".into(),
        )
        .unwrap();

        let event = user
            .update_user(UserChanges {
                email: Some("alice.new@example.com".into()),
                ..Default::default()
            })
            .unwrap();

        assert!(matches!(event, UserEvent::UserUpdated(_)));
        assert_eq!(user.email(), "alice.new@example.com");
        assert_eq!(user.username(), "alice");
        assert_eq!(user.version(), 2);
    }

    #[test]
    fn update_user_with_no_changes_is_rejected() {
        let mut user = new_user();
        user.create_user(
            Uuid::new_v4(),
            "alice".into(),
            "alice@example.com".into(),
            "Alice".into(),
            "Smith".into(),
            "hash".into(),
            "bcrypt".into(),
            "member".into(),
        )
        .unwrap();

        let result = user.update_user(UserChanges::default());
        assert_eq!(result, Err(DomainError::NoFieldsToUpdate));
    }

    #[test]
    fn update_user_before_create_is_not_found() {
        let mut user = new_user();
        let result = user.update_user(UserChanges {
            email: Some("a@b.com".into()),
            ..Default::default()
        });
        assert!(matches!(result, Err(DomainError::UserNotFound(_))));
    }

    #[test]
    fn change_password_requires_a_different_hash() {
        let mut user = new_user();
        user.create_user(
            Uuid::new_v4(),
            "alice".into(),
            "alice@example.com".into(),
            "Alice".into(),
            "Smith".into(),
            "hash-v1".into(),
            "bcrypt".into(),
            "member".into(),
        )
        .unwrap();

        let result = user.change_password("hash-v1".into(), "bcrypt".into());
        assert_eq!(result, Err(DomainError::PasswordMustBeDifferent));

        let event = user.change_password("hash-v2".into(), "bcrypt".into()).unwrap();
        assert!(matches!(event, UserEvent::PasswordChanged(_)));
        assert_eq!(user.password_hash(), "hash-v2");
    }

    #[test]
    fn delete_user_is_idempotent_guarded() {
        let mut user = new_user();
        user.create_user(
            Uuid::new_v4(),
            "alice".into(),
            "alice@example.com".into(),
            "Alice".into(),
            "Smith".into(),
            "hash".into(),
            "bcrypt".into(),
            "member".into(),
        )
        .unwrap();

        let event = user.delete_user().unwrap();
        assert!(matches!(event, UserEvent::UserDeleted(_)));
        assert!(user.is_deleted());

        let result = user.delete_user();
        assert_eq!(result, Err(DomainError::UserAlreadyDeleted));
    }

    #[test]
    fn cannot_update_or_change_password_after_delete() {
        let mut user = new_user();
        user.create_user(
            Uuid::new_v4(),
            "alice".into(),
            "alice@example.com".into(),
            "Alice".into(),
            "Smith".into(),
            "hash".into(),
            "bcrypt".into(),
            "member".into(),
        )
        .unwrap();
        user.delete_user().unwrap();

        assert_eq!(
            user.update_user(UserChanges {
                email: Some("x@y.com".into()),
                ..Default::default()
            }),
            Err(DomainError::CannotUpdateDeletedUser)
        );
        assert_eq!(
            user.change_password("new-hash".into(), "bcrypt".into()),
            Err(DomainError::CannotUpdateDeletedUser)
        );
    }
}
