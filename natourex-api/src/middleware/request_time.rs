/// Request timestamp
///
/// Records when the request entered the router as a [`RequestTime`]
/// extension.

use axum::{extract::Request, middleware::Next, response::Response};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestTime(pub DateTime<Utc>);

pub async fn stamp_request_time(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(RequestTime(Utc::now()));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Extension, Router};
    use tower::Service as _;

    #[tokio::test]
    async fn test_request_time_extension() {
        let before = Utc::now();
        let mut app = Router::new()
            .route(
                "/",
                get(|Extension(RequestTime(at)): Extension<RequestTime>| async move {
                    at.to_rfc3339()
                }),
            )
            .layer(axum::middleware::from_fn(stamp_request_time));

        let response = app
            .call(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let stamped = DateTime::parse_from_rfc3339(std::str::from_utf8(&body).unwrap()).unwrap();

        assert!(stamped.with_timezone(&Utc) >= before);
    }
}
