//! Request errors and their JSON responses.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors a request can fail with. Backend and sink failures are absorbed by
/// the core and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A telemetry header is missing or malformed
    #[error("{0}")]
    InvalidHeader(String),

    /// The multipart body is missing, malformed or has no usable image
    #[error("{0}")]
    BadUpload(String),

    /// The multipart stream broke off or exceeded the upload limit
    #[error("{}", .0.body_text())]
    Multipart(#[from] MultipartError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidHeader(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
        };

        tracing::warn!(status = status.as_u16(), "Rejected request: {self}");

        let body = json!({
            "status": "error",
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
