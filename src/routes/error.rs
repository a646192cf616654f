//! JSON error bodies for the HTTP layer.
//!
//! Every failing handler returns `{"error": {"code", "message", "retryable"}}`.
//! Status codes are chosen by one mapping function per error type. Extractor
//! rejections are routed here through `WithRejection<_, ApiError>`.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::services::ErrorCode;
use crate::services::ServiceError;
use crate::services::auth::AuthError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    fn from_error<E: ErrorCode>(status: StatusCode, err: &E) -> Self {
        Self { status, code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }

    /// Malformed request bodies that never reach a service.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::from_error(StatusCode::BAD_REQUEST, &ServiceError::Validation(message.into()))
    }
}

pub(crate) fn service_error_to_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::TransientStoreFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) fn auth_error_to_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::AlreadyRegistered => StatusCode::CONFLICT,
        AuthError::Validation(_) => StatusCode::BAD_REQUEST,
        AuthError::Service(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        if let ServiceError::TransientStoreFailure(msg) = &err {
            tracing::error!(error = %msg, "store call failed");
        }
        Self::from_error(service_error_to_status(&err), &err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        if let AuthError::Service(msg) = &err {
            tracing::error!(error = %msg, "auth store call failed");
        }
        Self::from_error(auth_error_to_status(&err), &err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "retryable": self.retryable,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
