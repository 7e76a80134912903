/// HTTP parameter pollution protection
///
/// A query parameter repeated in the query string keeps only its last value,
/// unless its field is on the whitelist, in which case every value is kept
/// (the list query then treats repeated equality filters as any-of).

use axum::{extract::Request, middleware::Next, response::Response};

use super::with_query;
use crate::error::ApiError;
use crate::extract::{encode_pairs, query_pairs};

/// Fields that may be repeated
pub const HPP_WHITELIST: &[&str] = &[
    "duration",
    "ratingsQuantity",
    "ratingsAverage",
    "maxGroupSize",
    "difficulty",
    "price",
];

fn base_name(key: &str) -> &str {
    key.split('[').next().unwrap_or(key)
}

/// Collapses repeated keys, keeping whitelisted ones
pub fn collapse_duplicates(pairs: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut kept: Vec<(String, String)> = Vec::with_capacity(pairs.len());

    for (key, value) in pairs {
        if HPP_WHITELIST.contains(&base_name(&key)) {
            kept.push((key, value));
            continue;
        }
        match kept.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => kept.push((key, value)),
        }
    }

    kept
}

pub async fn prevent_parameter_pollution(
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(raw) = request.uri().query() {
        let pairs = query_pairs(Some(raw))?;
        let collapsed = collapse_duplicates(pairs.clone());
        if collapsed != pairs {
            let uri = with_query(request.uri(), Some(&encode_pairs(&collapsed)?))?;
            *request.uri_mut() = uri;
        }
    }

    Ok(next.run(request).await)
}
