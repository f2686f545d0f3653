use crate::error::AppError;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

pub mod error_codes {
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const AUTHORIZATION_ERROR: &str = "AUTHORIZATION_ERROR";
    pub const MESSAGE_NOT_FOUND: &str = "MESSAGE_NOT_FOUND";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
    pub code: &'static str,
    /// Persistence failures leave no partial state; the client may retry the
    /// same request verbatim.
    pub retryable: bool,
}

/// Map domain errors to HTTP responses.
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let code = match err {
        AppError::BadRequest(_) => error_codes::INVALID_REQUEST,
        AppError::Unauthorized => error_codes::INVALID_CREDENTIALS,
        AppError::Forbidden(_) => error_codes::AUTHORIZATION_ERROR,
        AppError::NotFound | AppError::Database(sqlx::Error::RowNotFound) => {
            error_codes::MESSAGE_NOT_FOUND
        }
        AppError::Database(_) => error_codes::DATABASE_ERROR,
        AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => {
            error_codes::INTERNAL_SERVER_ERROR
        }
    };

    let response = ErrorResponse {
        error: status
            .canonical_reason()
            .unwrap_or("Error")
            .to_string(),
        message: err.to_string(),
        status: status.as_u16(),
        code,
        retryable: err.is_retryable(),
    };

    (status, response)
}

pub fn into_response(err: AppError) -> impl IntoResponse {
    let (status, response) = map_error(&err);
    (status, Json(response))
}
