//! # Natourex Shared Library
//!
//! Domain types, storage and authentication primitives used by the Natourex
//! API server.
//!
//! ## Module Organization
//!
//! - `models`: tours, users and reviews with their validated inputs
//! - `query`: filter/sort/projection/pagination parsing for list endpoints
//! - `geo`: coordinates, units and great-circle distances
//! - `analytics`: tour statistics, monthly plan and distance reports
//! - `repository`: storage traits with PostgreSQL and in-memory stores
//! - `db`: connection pool and migrations
//! - `auth`: password hashing and JWT

pub mod analytics;
pub mod auth;
pub mod db;
pub mod geo;
pub mod models;
pub mod query;
pub mod repository;

/// Current version of the Natourex shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
