//! Projection module
//!
//! Updates the `users` read-model table from events. This is the "P" in
//! CQRS — projections are derived state, optimized for queries, never
//! written to directly by command handlers.

mod email;
mod error;
mod user_projection;
mod watermark;

pub use email::{EmailError, EmailProvider, NoopEmailProvider};
pub use error::ProjectionError;
pub use user_projection::{ProjectionOutcome, UserProjection};
pub use watermark::ProjectionWatermarks;
