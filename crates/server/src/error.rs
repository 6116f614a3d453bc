use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{
        category::CategoryError, profile::ProfileError, task::TaskError, user::UserError,
    },
};
use thiserror::Error;
use utils_core::response::{ApiResponse, ErrorDetails};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("{message}")]
    Validation {
        message: String,
        details: ErrorDetails,
    },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(details: ErrorDetails) -> Self {
        ApiError::Validation {
            message: "Validation failed".to_string(),
            details,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query parameters: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::User(err) => match err {
                UserError::UserNotFound => (StatusCode::NOT_FOUND, "UserError"),
                UserError::DuplicateEmail => (StatusCode::CONFLICT, "UserError"),
                UserError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UserError"),
            },
            ApiError::Profile(err) => match err {
                ProfileError::ProfileNotFound | ProfileError::UserNotFound => {
                    (StatusCode::NOT_FOUND, "ProfileError")
                }
                ProfileError::DuplicateName => (StatusCode::CONFLICT, "ProfileError"),
                ProfileError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ProfileError"),
            },
            ApiError::Category(err) => match err {
                CategoryError::CategoryNotFound | CategoryError::ProfileNotFound => {
                    (StatusCode::NOT_FOUND, "CategoryError")
                }
                CategoryError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CategoryError"),
            },
            ApiError::Task(err) => match err {
                TaskError::TaskNotFound
                | TaskError::ProfileNotFound
                | TaskError::CategoryNotFound => (StatusCode::NOT_FOUND, "TaskError"),
                TaskError::CategoryProfileMismatch | TaskError::InvalidReorder(_) => {
                    (StatusCode::BAD_REQUEST, "TaskError")
                }
                TaskError::CrossPartition => (StatusCode::BAD_REQUEST, "CrossPartitionError"),
                TaskError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TaskError"),
            },
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            ApiError::Validation { .. } => (StatusCode::BAD_REQUEST, "ValidationError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
            let response = ApiResponse::<()>::error(INTERNAL_ERROR_MESSAGE);
            return (status_code, Json(response)).into_response();
        }

        let response = match self {
            ApiError::Validation { message, details } => {
                ApiResponse::<()>::error_with_details(&message, details)
            }
            ApiError::Task(TaskError::InvalidReorder(details)) => {
                ApiResponse::<()>::error_with_details("Validation failed", details)
            }
            other => ApiResponse::<()>::error(&other.to_string()),
        };
        (status_code, Json(response)).into_response()
    }
}
