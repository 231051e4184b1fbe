use axum::http::StatusCode;
use axum::response::IntoResponse;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Fetch failed: {0}")]
    FetchFailed(String),
    #[error("Fetch timed out")]
    Timeout,
    #[error("External error: {0}")]
    External(String),
    #[error("Not found")]
    NotFound,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "Upstream timeout").into_response(),
            AppError::FetchFailed(msg) | AppError::External(msg) => {
                (StatusCode::BAD_GATEWAY, msg).into_response()
            }
        }
    }
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        AppError::Validation(value)
    }
}
