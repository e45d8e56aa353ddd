//! API Routes
//!
//! HTTP endpoint definitions for the user directory service.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::auth::PasswordHasher;
use crate::dispatch::DispatchMode;
use crate::domain::{DomainError, UserChanges};
use crate::error::{AppError, AppResult};
use crate::handlers::{
    ChangePasswordCommand, ChangePasswordHandler, CreateUserCommand, CreateUserHandler,
    DeleteUserCommand, DeleteUserHandler, UpdateUserCommand, UpdateUserHandler,
};
use crate::projection::EmailProvider;
use crate::queries::{GetUserAtTimeQuery, GetUserQuery, ListUsersQuery};
use crate::read_model::{ListUsersOptions, UserRow};

use super::middleware::{auth_middleware, logging_middleware, AuthenticatedUser};

// =========================================================================
// Application state
// =========================================================================

/// Everything a route handler needs, parameterized over the two
/// out-of-scope collaborators (email delivery, password hashing) a real
/// deployment plugs in. `main.rs` picks the concrete `E`/`H`.
#[derive(Clone)]
pub struct AppState<E: EmailProvider + Clone, H: PasswordHasher + Clone> {
    pub pool: sqlx::PgPool,
    pub dispatch_mode: DispatchMode,
    pub email: E,
    pub password_hasher: H,
}

// =========================================================================
// Request/response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "user".to_string()
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub message: String,
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub results: Vec<UserResponse>,
    pub count: usize,
    pub page: i64,
    pub page_size: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(req: UpdateUserRequest) -> Self {
        UserChanges {
            username: req.username,
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub timestamp: DateTime<Utc>,
}

// =========================================================================
// Router
// =========================================================================

pub fn create_router<E, H>(state: AppState<E, H>) -> Router
where
    E: EmailProvider + Clone + Send + Sync + 'static,
    H: PasswordHasher + Clone + Send + Sync + 'static,
{
    let protected = Router::new()
        .route("/users", post(create_user::<E, H>))
        .route("/users", get(list_users::<E, H>))
        .route("/users/:user_id", get(get_user::<E, H>))
        .route("/users/:user_id", put(update_user::<E, H>))
        .route("/users/:user_id", delete(delete_user::<E, H>))
        .route("/users/:user_id/history", get(get_user_history::<E, H>))
        .route("/users/:user_id/password", put(change_password::<E, H>))
        .layer(middleware::from_fn(auth_middleware));

    Router::new()
        .route("/auth/login", post(login))
        .merge(protected)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

fn require_admin(user: &AuthenticatedUser) -> AppResult<()> {
    if user.role != "admin" {
        return Err(AppError::PermissionDenied("admin role required".to_string()));
    }
    Ok(())
}

fn require_self_or_admin(user: &AuthenticatedUser, target: Uuid) -> AppResult<()> {
    if user.id != target && user.role != "admin" {
        return Err(AppError::PermissionDenied(
            "you may only update your own user data".to_string(),
        ));
    }
    Ok(())
}

// =========================================================================
// Handlers
// =========================================================================

/// Out of scope: JWT issuance belongs to an external auth service. This
/// stub documents the contract `/auth/login` would honor without
/// implementing credential verification or token signing.
async fn login(Json(_req): Json<LoginRequest>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(json!({
            "error": "not_implemented",
            "type": "not_implemented",
            "message": "credential verification and token issuance are handled by an external auth service"
        })),
    )
}

async fn create_user<E, H>(
    State(state): State<AppState<E, H>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<Json<CreateUserResponse>>
where
    E: EmailProvider + Clone,
    H: PasswordHasher + Clone,
{
    require_admin(&user)?;

    let (password_hash, hashing_method) = state
        .password_hasher
        .hash(&req.password)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let handler = CreateUserHandler::new(state.pool.clone(), state.dispatch_mode, state.email.clone());
    let result = handler
        .execute(CreateUserCommand {
            user_id: Uuid::new_v4(),
            username: req.username,
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            password_hash,
            hashing_method,
            role: req.role,
        })
        .await?;

    Ok(Json(CreateUserResponse {
        message: "user created".to_string(),
        user_id: result.user_id,
    }))
}

/// Builds a pre-built page-link URL carrying the same filters as the
/// request that produced it, per the documented `ListUsers` contract.
fn page_link(page: i64, page_size: i64, params: &ListUsersParams) -> String {
    let mut link = format!("/users/?page={page}&page_size={page_size}");
    if let Some(username) = &params.username {
        link.push_str(&format!("&username={username}"));
    }
    if let Some(email) = &params.email {
        link.push_str(&format!("&email={email}"));
    }
    link
}

async fn list_users<E, H>(
    State(state): State<AppState<E, H>>,
    Extension(_user): Extension<AuthenticatedUser>,
    Query(params): Query<ListUsersParams>,
) -> Json<ListUsersResponse>
where
    E: EmailProvider + Clone,
    H: PasswordHasher + Clone,
{
    let page = params.page.max(1);
    let page_size = params.page_size.clamp(1, 200);

    let query = ListUsersQuery::new(state.pool.clone());
    let page_result = query
        .execute(&ListUsersOptions {
            include_deleted: false,
            username: params.username.clone(),
            email: params.email.clone(),
            limit: page_size,
            offset: (page - 1) * page_size,
        })
        .await;

    // Kept degraded-but-live rather than failing: a read-model hiccup
    // shows an empty page instead of a 500.
    let (rows, total) = match page_result {
        Ok(result) => (result.rows, result.total),
        Err(e) => {
            tracing::warn!(error = %e, "list_users query failed, degrading to empty page");
            (Vec::new(), 0)
        }
    };

    let next = if page * page_size < total {
        Some(page_link(page + 1, page_size, &params))
    } else {
        None
    };
    let previous = if page > 1 && (page - 1) * page_size < total {
        Some(page_link(page - 1, page_size, &params))
    } else {
        None
    };

    Json(ListUsersResponse {
        results: rows.into_iter().map(UserResponse::from).collect(),
        count: total as usize,
        page,
        page_size,
        next,
        previous,
    })
}

async fn get_user<E, H>(
    State(state): State<AppState<E, H>>,
    Extension(_user): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserEnvelope>>
where
    E: EmailProvider + Clone,
    H: PasswordHasher + Clone,
{
    let query = GetUserQuery::new(state.pool.clone());
    let row = query
        .execute(user_id)
        .await
        .map_err(AppError::Database)?
        .filter(|r| !r.is_deleted())
        .ok_or_else(|| AppError::Domain(DomainError::UserNotFound(user_id.to_string())))?;

    Ok(Json(UserEnvelope { user: row.into() }))
}

async fn get_user_history<E, H>(
    State(state): State<AppState<E, H>>,
    Extension(_user): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<HistoryQuery>,
) -> AppResult<Json<serde_json::Value>>
where
    E: EmailProvider + Clone,
    H: PasswordHasher + Clone,
{
    let query = GetUserAtTimeQuery::new(state.pool.clone());
    let user = query
        .execute(user_id, params.timestamp)
        .await
        .map_err(AppError::EventStore)?
        .ok_or_else(|| AppError::Domain(DomainError::UserNotFound(user_id.to_string())))?;

    Ok(Json(json!({
        "id": user.id(),
        "username": user.username(),
        "email": user.email(),
        "first_name": user.first_name(),
        "last_name": user.last_name(),
        "role": user.role(),
        "password_hash": user.password_hash(),
        "hashing_method": user.hashing_method(),
        "created_at": user.created_at(),
        "updated_at": user.updated_at(),
    })))
}

async fn update_user<E, H>(
    State(state): State<AppState<E, H>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<MessageResponse>>
where
    E: EmailProvider + Clone,
    H: PasswordHasher + Clone,
{
    require_self_or_admin(&user, user_id)?;

    let handler = UpdateUserHandler::new(state.pool.clone(), state.dispatch_mode, state.email.clone());
    handler
        .execute(UpdateUserCommand {
            user_id,
            changes: req.into(),
        })
        .await?;

    Ok(Json(MessageResponse { message: "user updated".to_string() }))
}

async fn change_password<E, H>(
    State(state): State<AppState<E, H>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>>
where
    E: EmailProvider + Clone,
    H: PasswordHasher + Clone,
{
    require_self_or_admin(&user, user_id)?;

    let read_model = crate::read_model::ReadModel::new(state.pool.clone());
    let (current_hash, current_method) = read_model
        .password_credentials(user_id)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::Domain(DomainError::UserNotFound(user_id.to_string())))?;

    let current_matches = state
        .password_hasher
        .verify(&req.current_password, &current_hash, &current_method)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if !current_matches {
        return Err(AppError::InvalidRequest("current password is incorrect".to_string()));
    }

    let (password_hash, hashing_method) = state
        .password_hasher
        .hash(&req.new_password)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let handler = ChangePasswordHandler::new(state.pool.clone(), state.dispatch_mode, state.email.clone());
    handler
        .execute(ChangePasswordCommand {
            user_id,
            password_hash,
            hashing_method,
        })
        .await?;

    Ok(Json(MessageResponse { message: "password changed".to_string() }))
}

async fn delete_user<E, H>(
    State(state): State<AppState<E, H>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>>
where
    E: EmailProvider + Clone,
    H: PasswordHasher + Clone,
{
    require_admin(&user)?;

    let handler = DeleteUserHandler::new(state.pool.clone(), state.dispatch_mode, state.email.clone());
    handler.execute(DeleteUserCommand { user_id }).await?;

    Ok(Json(MessageResponse { message: "user deleted".to_string() }))
}
