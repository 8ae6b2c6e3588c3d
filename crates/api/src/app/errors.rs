use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use wattcast_core::DomainError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::NotAuthorized(_) => StatusCode::FORBIDDEN,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::InsufficientHistory(_)
        | DomainError::InvalidTariffSchedule(_)
        | DomainError::NoForecastAvailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::ModelUnavailable(_) | DomainError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Malformed bodies, queries and path ids are validation failures.
pub fn bad_request(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", message)
}
