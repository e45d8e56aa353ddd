//! Domain module
//!
//! Core domain types: versioned events, the operation context carried
//! through a command, and pure domain errors.

pub mod context;
pub mod error;
pub mod events;

pub use context::OperationContext;
pub use error::DomainError;
pub use events::{
    AggregateType, EventKind, PasswordChangedV1, StoredEvent, UserChanges, UserCreatedV1,
    UserDeletedV1, UserEvent, UserUpdatedV1,
};
