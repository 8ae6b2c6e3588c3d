use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use wattcast_core::OptimizationRequest;

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn request_optimization(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<OptimizationRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };
    match services.forecasts.request_optimization(request).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
