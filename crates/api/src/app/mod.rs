//! HTTP API application wiring (Axum router + engine wiring).
//!
//! - `services.rs`: builds the `LedgerEngine` from configuration
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and query parsing helpers
//! - `errors.rs`: consistent JSON error responses

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use palletflow_infra::LedgerEngine;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router around an engine.
pub fn build_app(engine: LedgerEngine) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::log_requests))
                .layer(Extension(engine)),
        )
}
