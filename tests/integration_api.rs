//! HTTP API integration tests, covering spec scenarios S1-S6.
//!
//! Requires `TEST_DATABASE_URL` (or `DATABASE_URL`) pointing at a
//! Postgres instance with migrations applied.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use chrono::Utc;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use user_sourcing::api::{self, AppState};
use user_sourcing::auth::NoopPasswordHasher;
use user_sourcing::dispatch::DispatchMode;
use user_sourcing::projection::NoopEmailProvider;

mod common;

fn build_app(pool: sqlx::PgPool) -> axum::Router {
    let state = AppState {
        pool,
        dispatch_mode: DispatchMode::Sync,
        email: NoopEmailProvider,
        password_hasher: NoopPasswordHasher,
    };
    api::create_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn request(method: &str, uri: &str, caller: Uuid, role: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-Authenticated-User-Id", caller.to_string())
        .header("X-Authenticated-User-Role", role)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn s1_create_then_read() {
    let pool = common::setup_test_db().await;
    let app = build_app(pool.clone());
    let admin = Uuid::new_v4();

    let create_req = request(
        "POST",
        "/users",
        admin,
        "admin",
        json!({
            "username": "alice",
            "email": "alice@example.com",
            "first_name": "Alice",
            "last_name": "A",
            "password": "pw12345"
        }),
    );
    let response = app.clone().oneshot(create_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let user_id: Uuid = body["user_id"].as_str().unwrap().parse().unwrap();

    let event_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE aggregate_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(event_count, 1);

    let revision: i64 = sqlx::query_scalar("SELECT revision FROM events WHERE aggregate_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(revision, 1);

    let snapshot_revision: i64 =
        sqlx::query_scalar("SELECT revision FROM event_snapshots WHERE aggregate_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(snapshot_revision, 1);

    let get_req = request("GET", &format!("/users/{user_id}"), admin, "admin", json!({}));
    let response = app.oneshot(get_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["id"], user_id.to_string());
}

#[tokio::test]
async fn s2_update_then_history() {
    let pool = common::setup_test_db().await;
    let app = build_app(pool.clone());
    let admin = Uuid::new_v4();

    let before_creation = Utc::now();

    let create_req = request(
        "POST",
        "/users",
        admin,
        "admin",
        json!({
            "username": "bob",
            "email": "bob@example.com",
            "first_name": "Bob",
            "last_name": "B",
            "password": "pw12345"
        }),
    );
    let response = app.clone().oneshot(create_req).await.unwrap();
    let user_id: Uuid = body_json(response).await["user_id"].as_str().unwrap().parse().unwrap();

    let t0 = Utc::now();

    let update_req = request(
        "PUT",
        &format!("/users/{user_id}"),
        user_id,
        "user",
        json!({ "first_name": "Bobby" }),
    );
    let response = app.clone().oneshot(update_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let t1 = Utc::now();

    let before_req = request(
        "GET",
        &format!("/users/{user_id}/history?timestamp={}", before_creation.to_rfc3339()),
        admin,
        "admin",
        json!({}),
    );
    let response = app.clone().oneshot(before_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let at_t0_req = request(
        "GET",
        &format!("/users/{user_id}/history?timestamp={}", t0.to_rfc3339()),
        admin,
        "admin",
        json!({}),
    );
    let response = app.clone().oneshot(at_t0_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["first_name"], "Bob");

    let at_t1_req = request(
        "GET",
        &format!("/users/{user_id}/history?timestamp={}", t1.to_rfc3339()),
        admin,
        "admin",
        json!({}),
    );
    let response = app.oneshot(at_t1_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["first_name"], "Bobby");
}

#[tokio::test]
async fn s3_duplicate_username_conflicts() {
    let pool = common::setup_test_db().await;
    let app = build_app(pool.clone());
    let admin = Uuid::new_v4();

    let first_req = request(
        "POST",
        "/users",
        admin,
        "admin",
        json!({
            "username": "bob",
            "email": "bob@example.com",
            "first_name": "Bob",
            "last_name": "B",
            "password": "pw12345"
        }),
    );
    let response = app.clone().oneshot(first_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let duplicate_req = request(
        "POST",
        "/users",
        admin,
        "admin",
        json!({
            "username": "bob",
            "email": "bob2@example.com",
            "first_name": "Bob",
            "last_name": "Two",
            "password": "pw12345"
        }),
    );
    let response = app.oneshot(duplicate_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Resource Conflict");
    assert_eq!(body["details"], json!({ "username": "bob" }));

    let event_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM events WHERE event_kind = 'USER_CREATED' AND payload->>'username' = 'bob'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(event_count, 1);
}

#[tokio::test]
async fn s4_authorization_self_vs_other() {
    let pool = common::setup_test_db().await;
    let app = build_app(pool.clone());
    let admin = Uuid::new_v4();

    let create_req = request(
        "POST",
        "/users",
        admin,
        "admin",
        json!({
            "username": "carol",
            "email": "carol@example.com",
            "first_name": "Carol",
            "last_name": "C",
            "password": "pw12345"
        }),
    );
    let response = app.clone().oneshot(create_req).await.unwrap();
    let user_id: Uuid = body_json(response).await["user_id"].as_str().unwrap().parse().unwrap();

    let other_user = Uuid::new_v4();
    let forbidden_req = request(
        "PUT",
        &format!("/users/{user_id}"),
        other_user,
        "user",
        json!({ "first_name": "Hacked" }),
    );
    let response = app.clone().oneshot(forbidden_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("only update your own user data"));

    let self_req = request(
        "PUT",
        &format!("/users/{user_id}"),
        user_id,
        "user",
        json!({ "first_name": "Carolyn" }),
    );
    let response = app.oneshot(self_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn s5_soft_delete_then_list() {
    let pool = common::setup_test_db().await;
    let app = build_app(pool.clone());
    let admin = Uuid::new_v4();

    let mut user_ids = Vec::new();
    for name in ["dave", "erin", "frank"] {
        let create_req = request(
            "POST",
            "/users",
            admin,
            "admin",
            json!({
                "username": name,
                "email": format!("{name}@example.com"),
                "first_name": name,
                "last_name": "L",
                "password": "pw12345"
            }),
        );
        let response = app.clone().oneshot(create_req).await.unwrap();
        let user_id: Uuid = body_json(response).await["user_id"].as_str().unwrap().parse().unwrap();
        user_ids.push(user_id);
    }

    let deleted_id = user_ids[0];
    let delete_req = request("DELETE", &format!("/users/{deleted_id}"), admin, "admin", json!({}));
    let response = app.clone().oneshot(delete_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let list_req = request("GET", "/users", admin, "admin", json!({}));
    let response = app.clone().oneshot(list_req).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["count"], 2);
    let usernames: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert!(!usernames.contains(&"dave"));

    let get_deleted_req = request("GET", &format!("/users/{deleted_id}"), admin, "admin", json!({}));
    let response = app.oneshot(get_deleted_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn s6_point_in_time_around_password_change() {
    let pool = common::setup_test_db().await;
    let app = build_app(pool.clone());
    let admin = Uuid::new_v4();

    let before_creation = Utc::now();

    let create_req = request(
        "POST",
        "/users",
        admin,
        "admin",
        json!({
            "username": "gina",
            "email": "gina@example.com",
            "first_name": "Gina",
            "last_name": "G",
            "password": "pw12345"
        }),
    );
    let response = app.clone().oneshot(create_req).await.unwrap();
    let user_id: Uuid = body_json(response).await["user_id"].as_str().unwrap().parse().unwrap();

    let t0 = Utc::now();

    let password_req = request(
        "PUT",
        &format!("/users/{user_id}/password"),
        user_id,
        "user",
        json!({ "current_password": "pw12345", "new_password": "new-password-99" }),
    );
    let response = app.clone().oneshot(password_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let t1 = Utc::now();

    let before_req = request(
        "GET",
        &format!("/users/{user_id}/history?timestamp={}", before_creation.to_rfc3339()),
        admin,
        "admin",
        json!({}),
    );
    let response = app.clone().oneshot(before_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let at_t0_req = request(
        "GET",
        &format!("/users/{user_id}/history?timestamp={}", t0.to_rfc3339()),
        admin,
        "admin",
        json!({}),
    );
    let response = app.clone().oneshot(at_t0_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["password_hash"], "pw12345");

    let at_t1_req = request(
        "GET",
        &format!("/users/{user_id}/history?timestamp={}", t1.to_rfc3339()),
        admin,
        "admin",
        json!({}),
    );
    let response = app.clone().oneshot(at_t1_req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["password_hash"], "new-password-99");

    let read_model_hash: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(read_model_hash, "new-password-99");
}
