//! User directory service — event-sourced CQRS core behind an HTTP API.
//!
//! Aggregates and the event store are the system of record; the `users`
//! table is a disposable projection rebuildable from the event stream.

use std::net::SocketAddr;

use axum::{middleware, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod aggregate;
pub mod api;
pub mod auth;
mod config;
mod db;
pub mod dispatch;
pub mod domain;
mod error;
pub mod event_store;
pub mod handlers;
pub mod jobs;
pub mod projection;
pub mod queries;
pub mod read_model;
pub mod snapshot;
pub mod uow;

pub use config::Config;
pub use error::{AppError, AppResult};

use auth::NoopPasswordHasher;
use dispatch::ProjectionWorker;
use projection::NoopEmailProvider;

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("user_directory={log_level},tower_http={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the application router
fn build_router(
    state: api::AppState<NoopEmailProvider, NoopPasswordHasher>,
    config: &Config,
) -> Router {
    let allowed_hosts = std::sync::Arc::new(config.allowed_hosts.clone());

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/v1", api::create_router(state))
        .layer(middleware::from_fn(move |headers, request, next| {
            let allowed_hosts = allowed_hosts.clone();
            async move { api::middleware::host_filter_middleware(allowed_hosts, headers, request, next).await }
        }))
        .layer(cors_layer(&config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// No configured origins means no cross-origin browser access at all,
/// not "allow everything" — a deployment opts in explicitly.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<_> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Starting user directory server");
    tracing::info!("Connecting to database...");

    // Create database pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    // Verify database schema
    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");

    let dispatch_mode = config.dispatch_mode();
    tracing::info!(mode = ?dispatch_mode, "projection dispatch mode");

    if dispatch_mode == dispatch::DispatchMode::Async {
        let worker = ProjectionWorker::new(pool.clone(), NoopEmailProvider)
            .with_poll_interval(config.projection_poll_interval);
        tokio::spawn(worker.run());
        tracing::info!("projection worker started");
    }

    let job_scheduler = jobs::JobScheduler::new(pool.clone());
    job_scheduler.start();

    let state = api::AppState {
        pool: pool.clone(),
        dispatch_mode,
        email: NoopEmailProvider,
        password_hasher: NoopPasswordHasher,
    };

    tracing::info!("Listening on http://{}", addr);

    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    tracing::info!("Server shutting down...");
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}