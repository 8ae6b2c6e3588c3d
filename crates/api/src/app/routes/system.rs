use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn health_details(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(services.forecasts.health_details())
}
