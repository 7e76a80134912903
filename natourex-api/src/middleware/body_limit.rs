/// Request body cap
///
/// Buffers every body and rejects bodies over 10 KB with 413. Multipart
/// uploads to `PATCH /tours/:id/images` skip the cap; that route carries
/// its own larger limit.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{app::API_PREFIX, error::ApiError};

/// Largest accepted JSON or form body
pub const BODY_LIMIT: usize = 10 * 1024;

pub(crate) fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/"))
}

/// `/api/v2/tours/:id/images`
fn is_upload_path(path: &str) -> bool {
    path.strip_prefix(API_PREFIX)
        .and_then(|p| p.strip_prefix("/tours/"))
        .and_then(|p| p.split_once('/'))
        .is_some_and(|(id, rest)| !id.is_empty() && rest == "images")
}

fn too_large() -> ApiError {
    ApiError::PayloadTooLarge("Request body is larger than 10kb".to_string())
}

pub async fn limit_body(request: Request, next: Next) -> Result<Response, ApiError> {
    if is_multipart(request.headers()) && is_upload_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > BODY_LIMIT) {
        return Err(too_large());
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, BODY_LIMIT).await.map_err(|_| too_large())?;

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Router};
    use tower::Service as _;

    const UPLOAD_PATH: &str = "/api/v2/tours/5c88fa8cf4afda39709c2955/images";

    fn app() -> Router {
        Router::new()
            .route("/echo", post(|body: String| async move { body }))
            .route(UPLOAD_PATH, post(|body: String| async move { body.len().to_string() }))
            .layer(axum::middleware::from_fn(limit_body))
    }

    fn multipart(uri: &str, size: usize) -> Request {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "multipart/form-data; boundary=X")
            .body(Body::from("x".repeat(size)))
            .unwrap()
    }

    fn request(body: String) -> Request {
        Request::builder()
            .method("POST")
            .uri("/echo")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_small_body_passes() {
        let response = app().call(request("{\"name\":\"x\"}".to_string())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_large_body_rejected() {
        let body = format!("{{\"name\":\"{}\"}}", "x".repeat(BODY_LIMIT));
        let response = app().call(request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_multipart_capped_outside_upload_route() {
        let response = app().call(multipart("/echo", BODY_LIMIT + 1)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let response = app().call(multipart(UPLOAD_PATH, BODY_LIMIT + 1)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_upload_path() {
        assert!(is_upload_path("/api/v2/tours/abc/images"));
        assert!(!is_upload_path("/api/v2/tours/abc"));
        assert!(!is_upload_path("/api/v2/tours//images"));
        assert!(!is_upload_path("/api/v2/tours/abc/reviews"));
        assert!(!is_upload_path("/api/v2/users/signup"));
    }
}
