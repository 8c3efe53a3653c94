use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::types::FetchError;

#[derive(Debug)]
pub enum AppError {
    Fetch(FetchError),
    /// The blocking fetch task panicked or was cancelled.
    Internal(String),
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        AppError::Fetch(e)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Fetch(FetchError::InvalidInput { .. }) => StatusCode::BAD_REQUEST,
            AppError::Fetch(FetchError::Upstream { .. } | FetchError::Transport { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Fetch(e) => e.client_message(),
            AppError::Internal(e) => {
                error!("Fetch task failed: {e}");
                "internal error".to_string()
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
