//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - An in-memory store seeded with one user per role
//! - A router built exactly as in production
//! - JWT token generation
//! - Request and response helpers

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use natourex_api::app::{build_router, AppState};
use natourex_api::config::{
    ApiConfig, Config, DatabaseConfig, Environment, JwtConfig, RateLimitConfig,
};
use natourex_shared::auth::jwt::{create_token, Claims};
use natourex_shared::auth::password::hash_password;
use natourex_shared::models::{
    CreateTour, CreateUser, Difficulty, Location, Role, Tour, TourRecord, User, UserRecord,
};
use natourex_shared::repository::{memory::MemoryStore, Repositories};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tower::Service as _;
use uuid::Uuid;

/// Password of every seeded user
pub const PASSWORD: &str = "test1234";

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";

fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap()).clone()
}

pub fn test_config(public_dir: PathBuf) -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: Environment::Development,
            public_dir,
        },
        database: DatabaseConfig {
            url: None,
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            expires_in_days: 90,
            cookie_expires_in_days: 90,
        },
        rate_limit: RateLimitConfig::default(),
    }
}

/// Test context containing all necessary resources
pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub public_dir: PathBuf,
    pub admin: User,
    pub lead_guide: User,
    pub guide: User,
    pub user: User,
}

impl TestApp {
    pub fn new() -> Self {
        let public_dir = std::env::temp_dir().join(format!("natourex-test-{}", Uuid::new_v4()));
        let store = Arc::new(MemoryStore::new());

        let admin = seed_user(&store, "Jonas Schmedtmann", "admin@natours.io", Role::Admin);
        let lead_guide = seed_user(&store, "Miyah Myles", "miyah@example.com", Role::LeadGuide);
        let guide = seed_user(&store, "Jennifer Hardy", "jennifer@example.com", Role::Guide);
        let user = seed_user(&store, "Laura Wilson", "laura@example.com", Role::User);

        let state = AppState::new(
            Repositories::from_store(store.clone()),
            test_config(public_dir.clone()),
        );

        Self {
            app: build_router(state),
            store,
            public_dir,
            admin,
            lead_guide,
            guide,
            user,
        }
    }

    pub fn token_for(&self, user: &User) -> String {
        token(user.id, user.role)
    }

    /// Inserts a tour directly into the store
    pub fn seed_tour(&self, input: CreateTour) -> Tour {
        self.store.insert_tour(TourRecord::from_create(input)).unwrap()
    }

    pub async fn call(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().call(request).await.unwrap()
    }

    /// Sends a request and decodes the JSON body (`Null` when empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.call(request).await;
        let status = response.status();
        (status, json_body(response).await)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.public_dir);
    }
}

fn seed_user(store: &MemoryStore, name: &str, email: &str, role: Role) -> User {
    let input = CreateUser {
        name: name.to_string(),
        email: email.to_string(),
        password: PASSWORD.to_string(),
        password_confirm: PASSWORD.to_string(),
        photo: None,
        role: Some(role),
    };
    store
        .insert_user(UserRecord::new(&input, password_hash()))
        .unwrap()
}

pub fn token(user_id: Uuid, role: Role) -> String {
    create_token(&Claims::new(user_id, role, Duration::days(1)), JWT_SECRET).unwrap()
}

pub fn tour_input(name: &str, price: f64, rating: f64) -> CreateTour {
    CreateTour {
        name: name.to_string(),
        duration: 5,
        max_group_size: 25,
        difficulty: Difficulty::Easy,
        ratings_average: Some(rating),
        ratings_quantity: Some(10),
        price,
        price_discount: None,
        summary: "Breathtaking hike through the Canadian Banff National Park".to_string(),
        description: None,
        image_cover: "tour-1-cover.jpg".to_string(),
        images: Vec::new(),
        start_dates: Vec::new(),
        secret_tour: false,
        start_location: None,
        locations: Vec::new(),
        guides: Vec::new(),
    }
}

/// GeoJSON start location at `lat,lng`
pub fn located_at(lat: f64, lng: f64) -> Option<Location> {
    Some(Location {
        kind: "Point".to_string(),
        coordinates: [lng, lat],
        address: None,
        description: None,
        day: None,
    })
}

pub fn date(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    build("GET", uri, token, None)
}

pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    build("DELETE", uri, token, None)
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    build(method, uri, token, Some(body))
}

fn build(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    }
}
