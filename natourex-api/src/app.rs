/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use natourex_api::{app::AppState, config::Config};
/// use natourex_shared::repository::{memory::MemoryStore, Repositories};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let repos = Repositories::from_store(Arc::new(MemoryStore::new()));
/// let state = AppState::new(repos, config);
/// let app = natourex_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        body_limit::limit_body, cookies::parse_cookies, params::prevent_parameter_pollution,
        rate_limit::{rate_limit, RateLimiter},
        request_time::stamp_request_time,
        sanitize::sanitize_input,
        security::SecurityHeadersLayer,
    },
    routes,
};
use axum::{
    extract::Request,
    handler::HandlerWithoutStateExt,
    http::{StatusCode, Uri},
    middleware::{from_fn, from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use natourex_shared::repository::Repositories;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Prefix of every resource route
pub const API_PREFIX: &str = "/api/v2";

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Tour, user and review storage
    pub repos: Repositories,

    /// Application configuration
    pub config: Arc<Config>,

    /// Per-IP request counter for `/api` paths
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Creates new application state
    pub fn new(repos: Repositories, config: Config) -> Self {
        let rate_limiter = RateLimiter::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_secs),
        );

        Self {
            repos,
            config: Arc::new(config),
            rate_limiter: Arc::new(rate_limiter),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                  # Health check (public)
/// ├── /api/v2/
/// │   ├── /tours/              # see routes::tours
/// │   ├── /users/              # see routes::users
/// │   └── /reviews/            # see routes::reviews
/// └── (anything else)          # static files from PUBLIC_DIR, then 404
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. Security headers
/// 2. Request logging (development only)
/// 3. Rate limiting
/// 4. Body size limit
/// 5. Cookie parsing
/// 6. Input sanitization
/// 7. Parameter pollution protection
/// 8. Compression
/// 9. Request timestamp
/// 10. Unsupported verbs on known paths answer 404
///
/// Authentication and role checks are attached per route.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .nest("/tours", routes::tours::router(&state))
        .nest("/users", routes::users::router(&state))
        .nest("/reviews", routes::reviews::router(&state));

    let static_files = ServeDir::new(&state.config.api.public_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(not_found.into_service());

    let router = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest(API_PREFIX, api_routes)
        .fallback_service(static_files)
        .layer(from_fn(unsupported_method))
        .layer(from_fn(stamp_request_time))
        .layer(CompressionLayer::new())
        .layer(from_fn(prevent_parameter_pollution))
        .layer(from_fn(sanitize_input))
        .layer(from_fn(parse_cookies))
        .layer(from_fn(limit_body))
        .layer(from_fn_with_state(state.clone(), rate_limit));

    let production = state.config.api.is_production();

    let router = if production {
        router
    } else {
        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
    };

    router
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

/// Fallback for paths matching neither a route nor a public file
async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Can't find {} on this server!", uri))
}

/// Replaces the router's bare 405 with the JSON 404 of [`not_found`]
async fn unsupported_method(request: Request, next: Next) -> Response {
    let uri = request.uri().clone();
    let response = next.run(request).await;

    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        return not_found(uri).await.into_response();
    }
    response
}
