//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use convoy_types::error::DeliveryError;

use super::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
///
/// Only `start`-time failures reach HTTP; tick failures are reported through
/// logs and status counters.
#[derive(Debug)]
pub enum AppError {
    /// Delivery engine errors.
    Delivery(DeliveryError),
}

impl From<DeliveryError> for AppError {
    fn from(e: DeliveryError) -> Self {
        AppError::Delivery(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Delivery(DeliveryError::Config(e)) => {
                (StatusCode::BAD_REQUEST, "CONFIG_ERROR", e.to_string())
            }
            AppError::Delivery(DeliveryError::EmptyTemplates) => {
                (StatusCode::BAD_REQUEST, "CONFIG_ERROR", "No message templates found".to_string())
            }
            AppError::Delivery(DeliveryError::Cancelled) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SHUTTING_DOWN", "Server is shutting down".to_string())
            }
            AppError::Delivery(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DELIVERY_ERROR", e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, %message, "Request failed");
        }
        (status, Json(ApiResponse::error(code, &message))).into_response()
    }
}
