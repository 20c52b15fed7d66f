use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use services::ProgressServiceError;
use thiserror::Error;
use tracing::error;

use crate::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Progress(err) => match err {
                ProgressServiceError::CourseNotFound(_)
                | ProgressServiceError::LessonNotFound(_)
                | ProgressServiceError::ProgressNotFound(_) => StatusCode::NOT_FOUND,
                ProgressServiceError::Conflict => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Server faults are logged in full and reported without detail.
        let message = if status.is_server_error() {
            error!(error = ?self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, ApiResponse::failure(message)).into_response()
    }
}
