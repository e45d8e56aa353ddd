//! User Directory Service Library
//!
//! Re-exports modules for integration testing and external use.

pub mod aggregate;
pub mod api;
pub mod auth;
pub mod dispatch;
pub mod domain;
pub mod event_store;
pub mod handlers;
pub mod jobs;
pub mod projection;
pub mod queries;
pub mod read_model;
pub mod snapshot;
pub mod uow;

// Private modules (used only by main.rs binary)
pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use domain::{AggregateType, DomainError, EventKind, OperationContext, UserEvent};
