//! Aggregate module
//!
//! Aggregate Root pattern implementation for Event Sourcing.

pub mod user;

pub use user::User;

/// Aggregate trait that all aggregates must implement.
///
/// `apply` mutates in place rather than consuming and returning `Self`:
/// intent methods build an event and fold it into the aggregate within the
/// same call, so the in-memory instance always reflects every event it has
/// produced, not just the ones replayed from storage.
pub trait Aggregate: Sized + Default {
    /// The type of events this aggregate handles
    type Event;

    /// Get the aggregate type name (for storage)
    fn aggregate_type() -> &'static str;

    /// Get the aggregate ID
    fn id(&self) -> uuid::Uuid;

    /// Get the current revision (number of events applied)
    fn version(&self) -> i64;

    /// Apply an event to update the aggregate state
    fn apply(&mut self, event: Self::Event);

    /// Whether a snapshot should be written after this command. The core
    /// snapshots opportunistically: any command that successfully extends
    /// the stream is eligible, so this is always true once the aggregate
    /// has at least one event.
    fn should_snapshot(&self) -> bool {
        self.version() > 0
    }
}
