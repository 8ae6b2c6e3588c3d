//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, model registry and forecast service wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs for queries and admin bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    // Reads and model administration identify the caller by header.
    let identified = routes::identified_router().layer(axum::middleware::from_fn(middleware::requester_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/health/details", get(routes::system::health_details))
        .merge(routes::router())
        .merge(identified)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_log))
                .layer(Extension(services)),
        )
}
