//! Command Handlers module
//!
//! CQRS command handlers that orchestrate the load -> decide -> append ->
//! project -> dispatch pipeline. Each handler holds exactly its
//! collaborators (event store, snapshot store, dispatch mode, email
//! provider) via explicit dependency injection — no infrastructure-factory
//! singleton behind the scenes.

mod change_password_handler;
mod commands;
mod create_user_handler;
mod delete_user_handler;
mod loader;
mod update_user_handler;

pub use change_password_handler::ChangePasswordHandler;
pub use commands::*;
pub use create_user_handler::CreateUserHandler;
pub use delete_user_handler::DeleteUserHandler;
pub use update_user_handler::UpdateUserHandler;
