//! Snapshot module
//!
//! Periodic point-in-time captures of aggregate state, used to bound the
//! cost of reconstruction for long-lived streams.

mod error;
mod repository;

pub use error::SnapshotError;
pub use repository::{Snapshot, SnapshotStore};
