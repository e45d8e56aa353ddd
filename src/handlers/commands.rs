//! Command definitions
//!
//! Commands represent intentions to change the system state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::UserChanges;

/// Command to create a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserCommand {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub hashing_method: String,
    pub role: String,
}

/// Command to update a user's profile. Any field left `None` is
/// unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserCommand {
    pub user_id: Uuid,
    pub changes: UserChanges,
}

/// Command to change a user's password. The core never sees plaintext —
/// the caller (an authentication service) supplies the already-hashed
/// password.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordCommand {
    pub user_id: Uuid,
    pub password_hash: String,
    pub hashing_method: String,
}

/// Command to soft-delete a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUserCommand {
    pub user_id: Uuid,
}

/// Result of a successful user creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserResult {
    pub user_id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful user update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserResult {
    pub user_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// Result of a successful password change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordResult {
    pub user_id: Uuid,
    pub changed_at: DateTime<Utc>,
}

/// Result of a successful user deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteUserResult {
    pub user_id: Uuid,
    pub deleted_at: DateTime<Utc>,
}
