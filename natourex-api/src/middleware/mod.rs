/// Middleware for the API server
///
/// Stages run in this order for every request (outermost first):
///
/// 1. `security`: security headers and content security policy
/// 2. request logging (`tower_http::trace`, development only)
/// 3. `rate_limit`: per-IP sliding window on `/api` paths
/// 4. `body_limit`: 10 KB cap on JSON and form bodies
/// 5. `cookies`: `Cookie` header parsing
/// 6. `sanitize`: operator-key removal and HTML escaping of input
/// 7. `params`: duplicate query parameter collapsing
/// 8. response compression (`tower_http::compression`)
/// 9. `request_time`: request timestamp
///
/// `auth` holds the per-route `protect` and `restrict_to` stages.

pub mod auth;
pub mod body_limit;
pub mod cookies;
pub mod params;
pub mod rate_limit;
pub mod request_time;
pub mod sanitize;
pub mod security;

use axum::http::{uri::PathAndQuery, Uri};

use crate::error::ApiError;

/// Same URI with its query string replaced (`None` or empty removes it)
pub(crate) fn with_query(uri: &Uri, query: Option<&str>) -> Result<Uri, ApiError> {
    let path_and_query = match query {
        Some(query) if !query.is_empty() => format!("{}?{}", uri.path(), query),
        _ => uri.path().to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query)
            .map_err(|e| ApiError::BadRequest(format!("Invalid query string: {}", e)))?,
    );

    Uri::from_parts(parts).map_err(|e| ApiError::BadRequest(format!("Invalid URI: {}", e)))
}
