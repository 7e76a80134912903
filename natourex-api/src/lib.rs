//! # Natourex API Server Library
//!
//! This library provides the core functionality for the Natourex tour
//! booking API server.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Request extractors with uniform rejections
//! - `images`: Tour image upload processing
//! - `middleware`: Request pipeline stages
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod images;
pub mod middleware;
pub mod routes;
