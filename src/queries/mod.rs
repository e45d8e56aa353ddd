//! Query Handlers
//!
//! The "Q" in CQRS: read paths that never touch the aggregate or the event
//! store for current-state reads (`GetUser`, `ListUsers` are served from
//! the `users` read model), and one that deliberately bypasses the read
//! model for historical state (`GetUserAtTime`, replayed from the event
//! stream).

mod get_user;
mod get_user_at_time;
mod list_users;

pub use get_user::GetUserQuery;
pub use get_user_at_time::GetUserAtTimeQuery;
pub use list_users::ListUsersQuery;
