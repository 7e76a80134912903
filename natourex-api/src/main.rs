//! # Natourex API Server
//!
//! REST API for tours, users and reviews.
//!
//! ## Architecture
//!
//! The API server is built with Axum and provides:
//! - Tour, user and review resources under `/api/v2`
//! - Tour statistics, monthly plan and geospatial queries
//! - Authentication (JWT in header or cookie) with role checks
//! - Rate limiting, input sanitization and security headers
//!
//! Storage is PostgreSQL when `DATABASE_URL` is set and the in-memory store
//! otherwise.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p natourex-api
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use natourex_api::{app, config::Config};
use natourex_shared::{
    db::{
        migrations::{ensure_database_exists, run_migrations},
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    repository::{memory::MemoryStore, postgres::PgStore, Repositories},
};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "natourex_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Natourex API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    tracing::info!(environment = ?config.api.environment, "Configuration loaded");

    let (repos, pool) = match config.database.url.clone() {
        Some(url) => {
            let pool = connect(&url, config.database.max_connections).await?;
            let repos = Repositories::from_store(Arc::new(PgStore::new(pool.clone())));
            (repos, Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
            (Repositories::from_store(Arc::new(MemoryStore::new())), None)
        }
    };

    let address = config.bind_address();
    let state = app::AppState::new(repos, config);

    let shutdown = CancellationToken::new();
    let pruner = state.rate_limiter.clone().spawn_pruner(shutdown.clone());

    let router = app::build_router(state);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutdown signal received, stopping background tasks...");
    shutdown.cancel();
    if let Err(e) = pruner.await {
        tracing::warn!(error = %e, "Rate limit pruner did not stop cleanly");
    }

    if let Some(pool) = pool {
        close_pool(pool).await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Creates the database if needed, connects and applies migrations
async fn connect(url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    ensure_database_exists(url).await?;

    let pool = create_pool(DatabaseConfig {
        url: url.to_string(),
        max_connections,
        ..Default::default()
    })
    .await?;

    run_migrations(&pool).await?;
    tracing::info!("Database ready");

    Ok(pool)
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
