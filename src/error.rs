//! Error types for the drawing annotator server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::document::{SelectionError, SessionError};
use crate::render::RenderError;
use crate::services::ServiceError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Invalid page selection: {0}")]
    Selection(#[from] SelectionError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Session(e) => match e {
                SessionError::NotFound(_)
                | SessionError::AnnotationNotFound(_)
                | SessionError::LineNotFound { .. }
                | SessionError::PageOutOfRange { .. } => {
                    (StatusCode::NOT_FOUND, "not_found", e.to_string())
                }
                SessionError::PageNotLoaded(_)
                | SessionError::ResultsNotAvailable(_)
                | SessionError::NoPageOpen
                | SessionError::BatchInProgress(_) => {
                    (StatusCode::CONFLICT, "conflict", e.to_string())
                }
                SessionError::InvalidViewer(_) => {
                    (StatusCode::BAD_REQUEST, "bad_request", e.to_string())
                }
            },
            AppError::Selection(e) => (StatusCode::BAD_REQUEST, "invalid_selection", e.to_string()),
            AppError::Service(e) => {
                tracing::warn!("Service error: {}", e);
                (e.status_code(), "service_error", e.user_message())
            }
            AppError::Render(e) => match e {
                RenderError::Decode(_) => {
                    tracing::warn!("Page image decode failed: {}", e);
                    (StatusCode::BAD_GATEWAY, "decode_error", e.to_string())
                }
                _ => {
                    tracing::error!("Render error: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "render_error",
                        "Failed to render the page".to_string(),
                    )
                }
            },
            AppError::Multipart(e) => (StatusCode::BAD_REQUEST, "bad_request", e.body_text()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
