//! Common test utilities

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to the integration test database and truncate it to a clean
/// state. Prefers `TEST_DATABASE_URL` so integration tests never run
/// against a development database by accident; falls back to
/// `DATABASE_URL` for local runs where only one is configured.
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("TEST_DATABASE_URL or DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::query(
        "TRUNCATE TABLE events, event_snapshots, users, projection_tasks, projection_watermarks CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    pool
}

/// Headers an upstream gateway would attach after verifying a caller's
/// token. Tests stand in for that gateway directly.
pub fn auth_headers(user_id: uuid::Uuid, role: &str) -> Vec<(&'static str, String)> {
    vec![
        ("X-Authenticated-User-Id", user_id.to_string()),
        ("X-Authenticated-User-Role", role.to_string()),
    ]
}
