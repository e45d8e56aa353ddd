//! Read Model
//!
//! The `users` table queries are served from: a denormalized, current-state
//! projection of the user event stream. Populated exclusively by the event
//! dispatcher's projections (`crate::projection`), never written directly
//! by command handlers.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// A row in the `users` read-model table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserRow {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Options controlling a `list_users` page.
#[derive(Debug, Clone)]
pub struct ListUsersOptions {
    pub include_deleted: bool,
    pub username: Option<String>,
    pub email: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListUsersOptions {
    fn default() -> Self {
        Self {
            include_deleted: false,
            username: None,
            email: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Appends the `username`/`email`/`deleted_at` predicates `list_users` and
/// `count_users` share, so the two queries can never drift apart on what
/// "matching" means.
fn push_user_filters<'a>(qb: &mut sqlx::QueryBuilder<'a, sqlx::Postgres>, options: &'a ListUsersOptions) {
    if !options.include_deleted {
        qb.push(" AND deleted_at IS NULL");
    }
    if let Some(username) = &options.username {
        qb.push(" AND username = ").push_bind(username.as_str());
    }
    if let Some(email) = &options.email {
        qb.push(" AND email = ").push_bind(email.as_str());
    }
}

const MAX_LIST_LIMIT: i64 = 200;

/// Read access to the `users` projection.
#[derive(Debug, Clone)]
pub struct ReadModel {
    pool: PgPool,
}

impl ReadModel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a single user by id. Soft-deleted users are still returned —
    /// callers that need to exclude them check `is_deleted()`.
    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<UserRow>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, username, email, first_name, last_name, role,
                   created_at, updated_at, deleted_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Fetch one page of live rows matching `query`'s filters.
    pub async fn list_users(&self, query: &ListUsersOptions) -> Result<Vec<UserRow>, sqlx::Error> {
        let limit = query.limit.clamp(1, MAX_LIST_LIMIT);

        let mut qb = sqlx::QueryBuilder::new(
            "SELECT id, username, email, first_name, last_name, role, \
             created_at, updated_at, deleted_at FROM users WHERE 1 = 1",
        );
        push_user_filters(&mut qb, query);
        qb.push(" ORDER BY created_at ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        qb.build_query_as::<UserRow>().fetch_all(&self.pool).await
    }

    /// Total rows matching `query`'s filters, ignoring pagination — what
    /// `ListUsersResponse.count` reports.
    pub async fn count_users(&self, query: &ListUsersOptions) -> Result<i64, sqlx::Error> {
        let mut qb = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM users WHERE 1 = 1");
        push_user_filters(&mut qb, query);

        qb.build_query_scalar().fetch_one(&self.pool).await
    }

    /// Fetch the current `(password_hash, hashing_method)` for a live
    /// user, so the HTTP layer can verify a caller's current password
    /// before accepting a change. Kept off `UserRow` since ordinary reads
    /// have no business seeing it.
    pub async fn password_credentials(&self, user_id: Uuid) -> Result<Option<(String, String)>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT password_hash, hashing_method
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Whether a live (non-deleted) username or email is already taken by
    /// a different user, and which field it was. Used by
    /// `CreateUserHandler` as a fast precheck; the real uniqueness
    /// guarantee is the DB's partial unique index, not this advisory
    /// check (see DESIGN.md). Username is checked first, so a request
    /// colliding on both fields reports the username.
    pub async fn conflicting_field(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<(&'static str, String)>, sqlx::Error> {
        let username_taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE deleted_at IS NULL AND username = $1)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        if username_taken {
            return Ok(Some(("username", username.to_string())));
        }

        let email_taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE deleted_at IS NULL AND email = $1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        if email_taken {
            return Ok(Some(("email", email.to_string())));
        }

        Ok(None)
    }
}
