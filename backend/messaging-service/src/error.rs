use crate::middleware::error_handling;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error_handling::into_response(self).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    /// Persistence is the first and authoritative step of every mutation, so
    /// a store failure leaves no partial state behind and the caller may
    /// simply retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Database(e) => !matches!(e, sqlx::Error::RowNotFound),
            AppError::Internal => true,
            _ => false,
        }
    }

    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized => 401,
            AppError::Forbidden(_) => 403,
            AppError::NotFound => 404,
            AppError::Database(sqlx::Error::RowNotFound) => 404,
            AppError::Config(_)
            | AppError::StartServer(_)
            | AppError::Database(_)
            | AppError::Internal => 500,
        }
    }
}
