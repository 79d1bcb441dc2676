//! HTTP mapping of service errors.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::{ErrorBody, ErrorCode};
use crate::service::ServiceError;

#[derive(Debug)]
pub struct ApiError(pub ServiceError);

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation | ErrorCode::EmptyCart => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::OutOfStock | ErrorCode::Stock | ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Payment => StatusCode::PAYMENT_REQUIRED,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self { Self(error) }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self { Self(ServiceError::Validation(rejection.body_text())) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let detail = match &self.0 {
            ServiceError::Store(source) => {
                tracing::error!(error = %source, "request failed on storage");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status_for(code), Json(ErrorBody { detail, code })).into_response()
    }
}
