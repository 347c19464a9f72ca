use crate::models::HabitId;
use axum::http::StatusCode;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum HabitError {
    #[error("habit {0} not found")]
    NotFound(HabitId),
    #[error("habit {0} belongs to another user")]
    Forbidden(HabitId),
    #[error("invalid habit: {0}")]
    Validation(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for HabitError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<std::io::Error> for HabitError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

pub type HabitResult<T> = Result<T, HabitError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        error!("request failed: {err}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".to_string(),
        }
    }
}

impl From<HabitError> for AppError {
    fn from(err: HabitError) -> Self {
        let status = match err {
            HabitError::NotFound(_) => StatusCode::NOT_FOUND,
            HabitError::Forbidden(_) => StatusCode::FORBIDDEN,
            HabitError::Validation(_) => StatusCode::BAD_REQUEST,
            HabitError::Storage(_) => return Self::internal(err),
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
