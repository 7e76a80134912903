/// Input sanitization
///
/// Applied to query strings, JSON bodies and form bodies before routing:
///
/// - keys starting with `$` (also inside brackets, `price[$ne]`) or containing
///   `.` are removed, so no operator syntax reaches the query layer
/// - `<` and `>` in string values are escaped as `&lt;` / `&gt;`
///
/// Bodies that are not valid JSON are passed through untouched; the JSON
/// extractor rejects them later.

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use super::{body_limit::is_multipart, with_query};
use crate::error::ApiError;
use crate::extract::{encode_pairs, query_pairs};

/// Whether a key carries operator or path syntax
pub fn is_forbidden_key(key: &str) -> bool {
    key.contains('.')
        || key
            .split(['[', ']'])
            .any(|segment| segment.starts_with('$'))
}

/// Escapes markup characters
pub fn escape_html(value: &str) -> String {
    value.replace('<', "&lt;").replace('>', "&gt;")
}

/// Recursively drops forbidden keys and escapes strings
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !is_forbidden_key(key))
                .map(|(key, value)| (key, sanitize_value(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::String(s) => Value::String(escape_html(&s)),
        other => other,
    }
}

pub fn sanitize_pairs(pairs: Vec<(String, String)>) -> Vec<(String, String)> {
    pairs
        .into_iter()
        .filter(|(key, _)| !is_forbidden_key(key))
        .map(|(key, value)| (key, escape_html(&value)))
        .collect()
}

enum BodyKind {
    Json,
    Form,
    Other,
}

fn body_kind(headers: &HeaderMap) -> BodyKind {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if content_type.starts_with("application/json") {
        BodyKind::Json
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        BodyKind::Form
    } else {
        BodyKind::Other
    }
}

fn sanitize_body(kind: &BodyKind, bytes: Bytes) -> Result<Bytes, ApiError> {
    match kind {
        BodyKind::Json => match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => serde_json::to_vec(&sanitize_value(value))
                .map(Bytes::from)
                .map_err(|e| ApiError::InternalError(format!("Body encoding failed: {}", e))),
            Err(_) => Ok(bytes),
        },
        BodyKind::Form => {
            let raw = std::str::from_utf8(&bytes)
                .map_err(|_| ApiError::BadRequest("Form body is not valid UTF-8".to_string()))?;
            let pairs = query_pairs(Some(raw))?;
            Ok(Bytes::from(encode_pairs(&sanitize_pairs(pairs))?))
        }
        BodyKind::Other => Ok(bytes),
    }
}

pub async fn sanitize_input(request: Request, next: Next) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();

    if let Some(raw) = parts.uri.query() {
        let pairs = query_pairs(Some(raw))?;
        let cleaned = sanitize_pairs(pairs.clone());
        if cleaned != pairs {
            parts.uri = with_query(&parts.uri, Some(&encode_pairs(&cleaned)?))?;
        }
    }

    let kind = body_kind(&parts.headers);
    let multipart = is_multipart(&parts.headers);
    let body = match kind {
        BodyKind::Other => body,
        _ if multipart => body,
        _ => {
            let bytes = to_bytes(body, usize::MAX)
                .await
                .map_err(|e| ApiError::BadRequest(format!("Could not read body: {}", e)))?;
            let cleaned = sanitize_body(&kind, bytes)?;
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(cleaned.len()));
            Body::from(cleaned)
        }
    };

    Ok(next.run(Request::from_parts(parts, body)).await)
}
