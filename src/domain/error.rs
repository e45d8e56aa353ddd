//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

/// These errors represent business rule violations and domain invariant
/// failures raised by aggregate intent methods. They are independent of
/// the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("username must be at least 3 characters")]
    UsernameTooShort,

    #[error("invalid email format")]
    InvalidEmailFormat,

    #[error("password is required")]
    PasswordRequired,

    #[error("no fields provided to update")]
    NoFieldsToUpdate,

    #[error("cannot update a deleted user")]
    CannotUpdateDeletedUser,

    #[error("user is already deleted")]
    UserAlreadyDeleted,

    #[error("new password must differ from the current password")]
    PasswordMustBeDifferent,

    #[error("{field} already exists: {value}")]
    UserAlreadyExists { field: String, value: String },

    #[error("user not found: {0}")]
    UserNotFound(String),
}

impl DomainError {
    /// Check if this is a client error (caller's fault, fixable by sending
    /// a different request)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UsernameTooShort
                | Self::InvalidEmailFormat
                | Self::PasswordRequired
                | Self::NoFieldsToUpdate
                | Self::CannotUpdateDeletedUser
                | Self::UserAlreadyDeleted
                | Self::PasswordMustBeDifferent
        )
    }

    /// Check if this is a conflict error (state already matches, or an
    /// identity collision)
    pub fn is_conflict_error(&self) -> bool {
        matches!(self, Self::UserAlreadyExists { .. } | Self::UserAlreadyDeleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_client_errors() {
        assert!(DomainError::UsernameTooShort.is_client_error());
        assert!(DomainError::InvalidEmailFormat.is_client_error());
    }

    #[test]
    fn user_already_exists_is_a_conflict() {
        let err = DomainError::UserAlreadyExists {
            field: "username".into(),
            value: "bob".into(),
        };
        assert!(err.is_conflict_error());
    }

    #[test]
    fn user_not_found_is_neither() {
        let err = DomainError::UserNotFound("123".into());
        assert!(!err.is_client_error());
        assert!(!err.is_conflict_error());
    }
}
