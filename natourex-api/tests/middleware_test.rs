/// Integration tests for the request pipeline
///
/// Covers the global layers every request passes through: rate limiting,
/// security headers, the body cap, parameter pollution, input sanitizing,
/// static files and the JSON 404 fallback.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{get, json_request, tour_input, TestApp};
use natourex_api::middleware::rate_limit::RATE_LIMIT_MESSAGE;
use natourex_shared::models::CreateTour;
use serde_json::json;

#[tokio::test]
async fn test_rate_limit_on_api_paths() {
    let ctx = TestApp::new();

    for i in 0..100 {
        let response = ctx.call(get("/api/v2/tours", None)).await;
        assert_eq!(response.status(), StatusCode::OK, "request {}", i + 1);
    }

    let response = ctx.call(get("/api/v2/tours", None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

    let body = common::json_body(response).await;
    assert_eq!(body, json!(RATE_LIMIT_MESSAGE));

    let (status, _) = ctx.send(get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers() {
    let ctx = TestApp::new();

    let response = ctx.call(get("/api/v2/tours", None)).await;
    let headers = response.headers();

    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    assert!(headers[header::CONTENT_SECURITY_POLICY]
        .to_str()
        .unwrap()
        .contains("default-src 'self'"));
    assert!(headers.get(header::STRICT_TRANSPORT_SECURITY).is_none());

    let response = ctx.call(get("/api/v2/missing", None)).await;
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}

#[tokio::test]
async fn test_body_over_limit_rejected() {
    let ctx = TestApp::new();
    let admin = ctx.token_for(&ctx.admin);

    let (status, body) = ctx
        .send(json_request(
            "POST",
            "/api/v2/tours",
            Some(&admin),
            json!({ "name": "The Long Tour", "description": "x".repeat(11 * 1024) }),
        ))
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["message"], "Request body is larger than 10kb");
}

#[tokio::test]
async fn test_parameter_pollution() {
    let ctx = TestApp::new();
    ctx.seed_tour(CreateTour {
        duration: 5,
        ..tour_input("The Forest Hiker", 397.0, 4.7)
    });
    ctx.seed_tour(CreateTour {
        duration: 9,
        ..tour_input("The Sea Explorer", 497.0, 4.8)
    });
    ctx.seed_tour(CreateTour {
        duration: 7,
        ..tour_input("The Snow Adventurer", 997.0, 4.5)
    });

    let (status, body) = ctx
        .send(get("/api/v2/tours?duration=5&duration=9", None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 2);

    // Non-whitelisted keys keep their last value
    let (status, body) = ctx
        .send(get("/api/v2/tours?sort=price&sort=-price", None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["data"][0]["name"], "The Snow Adventurer");
}

#[tokio::test]
async fn test_operator_keys_dropped_from_query() {
    let ctx = TestApp::new();
    ctx.seed_tour(tour_input("The Forest Hiker", 397.0, 4.7));
    ctx.seed_tour(tour_input("The Sea Explorer", 497.0, 4.8));

    let (status, body) = ctx
        .send(get("/api/v2/tours?price%5B%24ne%5D=1", None))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 2);
}

#[tokio::test]
async fn test_markup_escaped_in_body() {
    let ctx = TestApp::new();

    let (status, body) = ctx
        .send(json_request(
            "POST",
            "/api/v2/users/signup",
            None,
            json!({
                "name": "<b>Mallory</b>",
                "email": "mallory@example.com",
                "password": "pass1234",
                "passwordConfirm": "pass1234",
                "$where": "1"
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"]["name"], "&lt;b&gt;Mallory&lt;/b&gt;");
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let ctx = TestApp::new();

    let (status, body) = ctx.send(get("/api/v2/nothing-here", None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Can't find /api/v2/nothing-here on this server!");

    let request = Request::builder()
        .method("PUT")
        .uri("/overview.html")
        .body(Body::empty())
        .unwrap();
    let (status, _) = ctx.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unsupported_method_on_known_path_returns_json_404() {
    let ctx = TestApp::new();

    let request = Request::builder()
        .method("PUT")
        .uri("/api/v2/tours")
        .body(Body::empty())
        .unwrap();
    let (status, body) = ctx.send(request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Can't find /api/v2/tours on this server!");

    // Protected paths answer the same without a token
    let request = Request::builder()
        .method("DELETE")
        .uri("/api/v2/users/me")
        .body(Body::empty())
        .unwrap();
    let (status, body) = ctx.send(request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Can't find /api/v2/users/me on this server!");
}

#[tokio::test]
async fn test_static_files_served() {
    let ctx = TestApp::new();
    std::fs::create_dir_all(ctx.public_dir.join("css")).unwrap();
    std::fs::write(ctx.public_dir.join("css/style.css"), "body { margin: 0; }").unwrap();

    let response = ctx.call(get("/css/style.css", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/css"));
    assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "SAMEORIGIN");
}
