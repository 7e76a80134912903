/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `factory`: generic list/get/create/update/delete handlers
/// - `tours`: tour routes, aliases, reports, geo queries and images
/// - `users`: user administration and the current user's profile
/// - `reviews`: review routes, also nested under a tour
/// - `auth`: signup, login and logout
/// - `health`: readiness check
///
/// Successful responses share one envelope:
///
/// ```json
/// { "status": "success", "results": 2, "data": { "data": [ ... ] } }
/// ```

pub mod auth;
pub mod factory;
pub mod health;
pub mod reviews;
pub mod tours;
pub mod users;

use serde::Serialize;

/// Success envelope
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,

    /// Number of items, on listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,

    /// Issued JWT, on signup and login
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            results: None,
            token: None,
            data: Some(data),
        }
    }

    pub fn with_results(mut self, results: usize) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

impl Envelope<()> {
    /// `{ "status": "success" }`
    pub fn empty() -> Self {
        Self {
            status: "success",
            results: None,
            token: None,
            data: None,
        }
    }
}

/// `{ "data": ... }` payload used by the generic handlers
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}
