use axum::{
    Router,
    routing::{get, post},
};

pub mod forecast;
pub mod models;
pub mod optimization;
pub mod system;

/// Endpoints whose body carries `requested_by`.
pub fn router() -> Router {
    Router::new()
        .route("/forecast", post(forecast::request_forecast))
        .route("/optimization", post(optimization::request_optimization))
}

/// Endpoints that identify the caller through the `x-requested-by` header.
pub fn identified_router() -> Router {
    Router::new()
        .route("/forecast/:id", get(forecast::get_forecast))
        .route("/forecast/latest/:building_id", get(forecast::get_latest_forecast))
        .nest("/models", models::router())
}
