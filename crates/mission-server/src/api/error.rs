//! API error type and the JSON error envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mission_core::models::MissionId;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use super::request_id::RequestId;
use super::response::timestamp;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Uploaded file exceeds the {0} byte limit")]
    PayloadTooLarge(usize),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn mission_not_found(id: MissionId) -> Self {
        ApiError::NotFound(format!("Mission with ID {} not found", id))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render the error envelope for the given request.
    pub fn into_envelope(self, request_id: &RequestId) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(err) => error!("Request failed: {:#}", err),
            other => warn!("Request rejected ({}): {}", status.as_u16(), other),
        }

        let message = self.to_string();
        let body = json!({
            "success": false,
            "message": message,
            "error": {
                "message": message,
                "code": status.as_u16(),
            },
            "timestamp": timestamp(),
            "request_id": request_id.as_str(),
        });
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_envelope(&RequestId::generate())
    }
}
