//! Success envelope shared by every handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use mission_core::models::ApiResponse;
use serde::Serialize;

use super::error::ApiError;
use super::request_id::RequestId;

pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A successful handler outcome, before the envelope is applied.
pub struct Reply<T> {
    status: StatusCode,
    data: Option<T>,
    message: Option<String>,
}

impl<T: Serialize> Reply<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data: Some(data),
            message: None,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }

    fn into_envelope(self, request_id: &RequestId) -> Response {
        let body = ApiResponse {
            success: self.status.is_success() || self.status.is_redirection(),
            data: self.data,
            message: self.message,
            timestamp: Some(timestamp()),
            request_id: Some(request_id.to_string()),
        };
        (self.status, Json(body)).into_response()
    }
}

impl Reply<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Wrap a handler outcome in the standard envelope.
pub fn respond<T: Serialize>(request_id: &RequestId, result: Result<Reply<T>, ApiError>) -> Response {
    match result {
        Ok(reply) => reply.into_envelope(request_id),
        Err(err) => err.into_envelope(request_id),
    }
}
