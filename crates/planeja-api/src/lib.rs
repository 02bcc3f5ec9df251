//! Planeja+ API - REST API server
//!
//! This crate provides the REST API for Planeja+, including header-based
//! caller identification, the invitation endpoints and the report endpoints.

pub mod auth;
pub mod handlers;
pub mod openapi;
pub mod routes;

pub use auth::AppState;
pub use openapi::create_openapi_routes;
pub use routes::create_router;
