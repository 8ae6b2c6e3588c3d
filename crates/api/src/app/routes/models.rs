use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use wattcast_core::{DomainResult, ModelId, ModelMetadata, PerformanceMetrics};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequesterContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_model).get(list_models))
        .route("/performance", get(performance_report))
        .route("/:id/promote", post(promote_model))
        .route("/:id/retire", post(retire_model))
        .route("/:id/performance", post(record_performance))
}

fn parse_model_id(raw: &str) -> Result<ModelId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

fn metadata_response(result: DomainResult<ModelMetadata>) -> axum::response::Response {
    match result {
        Ok(metadata) => (StatusCode::OK, Json(metadata)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn register_model(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
    body: Result<Json<dto::RegisterModelRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };
    match services
        .forecasts
        .register_model(requester.requested_by(), body.metadata, body.artifact)
    {
        Ok(metadata) => (StatusCode::CREATED, Json(metadata)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_models(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
    query: Result<Query<dto::ModelsQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };
    match services.forecasts.list_models(requester.requested_by(), &query.building_id) {
        Ok(items) => (StatusCode::OK, Json(json!({ "items": items }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn promote_model(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match parse_model_id(&id) {
        Ok(id) => metadata_response(services.forecasts.promote_model(requester.requested_by(), id)),
        Err(resp) => resp,
    }
}

pub async fn retire_model(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match parse_model_id(&id) {
        Ok(id) => metadata_response(services.forecasts.retire_model(requester.requested_by(), id)),
        Err(resp) => resp,
    }
}

pub async fn record_performance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::RecordPerformanceRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_model_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };
    let result = PerformanceMetrics::new(body.mae, body.rmse)
        .and_then(|metrics| services.forecasts.record_performance(requester.requested_by(), id, metrics));
    match result {
        Ok(effective) => (StatusCode::OK, Json(json!({ "model_id": id, "effective": effective }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn performance_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
    query: Result<Query<dto::PerformanceQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };
    match services
        .forecasts
        .performance_report(requester.requested_by(), &query.building_id, query.algorithm)
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
