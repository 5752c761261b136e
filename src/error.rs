use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("not found")]
    NotFound,

    /// Transient persistence failure; safe to retry with backoff.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("report already resolved")]
    AlreadyResolved,

    #[error("internal server error")]
    Internal,
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::StoreUnavailable(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        AppError::StoreUnavailable(e.to_string())
    }
}

impl AppError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::PermissionDenied => 403,
            AppError::NotFound => 404,
            AppError::AlreadyResolved => 409,
            AppError::StoreUnavailable(_) => 503,
            AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => 500,
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = actix_web::http::StatusCode::from_u16(self.status_code())
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(AppError::PermissionDenied.status_code(), 403);
        assert_eq!(AppError::AlreadyResolved.status_code(), 409);
        assert_eq!(AppError::StoreUnavailable("down".into()).status_code(), 503);
        assert_eq!(AppError::NotFound.status_code(), 404);
    }

    #[test]
    fn only_store_failures_are_retryable() {
        assert!(AppError::StoreUnavailable("timeout".into()).is_retryable());
        assert!(!AppError::PermissionDenied.is_retryable());
        assert!(!AppError::AlreadyResolved.is_retryable());
    }
}
