use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};

use wattcast_core::{BuildingId, ForecastId, ForecastRequest};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequesterContext;

pub async fn request_forecast(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<ForecastRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };
    match services.forecasts.request_forecast(request).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_forecast(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ForecastId = match id.parse() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.forecasts.get_forecast(requester.requested_by(), id).await {
        Ok(forecast) => (StatusCode::OK, Json(forecast)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_latest_forecast(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(requester): Extension<RequesterContext>,
    Path(building_id): Path<String>,
    query: Result<Query<dto::LatestForecastQuery>, QueryRejection>,
) -> axum::response::Response {
    let building_id = match BuildingId::parse(building_id) {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::bad_request(rejection.body_text()),
    };
    match services
        .forecasts
        .get_latest_forecast(requester.requested_by(), &building_id, query.horizon, query.forecast_type)
        .await
    {
        Ok(forecast) => (StatusCode::OK, Json(forecast)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
