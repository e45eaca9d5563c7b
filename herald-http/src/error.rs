//! Mapping of facade errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use herald_scheduler::SchedulerError;
use thiserror::Error;
use tracing::error;

use crate::dto::ErrorResponse;

/// Errors a handler can produce.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body failed validation.
    #[error("{0}")]
    Validation(String),

    /// The facade refused or failed the operation.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Self::Scheduler(err) => match err {
                SchedulerError::SendAtInPast | SchedulerError::CannotCancel => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                SchedulerError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                SchedulerError::Store(_) | SchedulerError::Bus(_) => {
                    error!(error = %err, "Request failed on a backend");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal error".to_string(),
                    )
                }
            },
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
