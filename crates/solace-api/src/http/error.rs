//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use solace_types::error::PipelineError;

use crate::http::response::{ApiResponse, insert_pipeline_headers};

/// Message returned for every upstream failure. Details stay in the logs.
const PROCESSING_FAILED_MESSAGE: &str = "Unable to generate a response right now. Please try again.";

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// The pipeline ended before any bytes were streamed.
    Pipeline {
        request_id: Uuid,
        model: String,
        error: PipelineError,
    },
    /// The request body was well-formed JSON but unusable.
    Validation {
        request_id: Uuid,
        model: String,
        message: String,
    },
    /// Generic internal error.
    Internal(String),
}

impl AppError {
    pub fn pipeline(request_id: Uuid, model: impl Into<String>, error: PipelineError) -> Self {
        AppError::Pipeline {
            request_id,
            model: model.into(),
            error,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Pipeline {
                request_id,
                model,
                error,
            } => {
                let (status, code, message, retry_after) = match &error {
                    PipelineError::AdmissionDenied {
                        retry_after_secs, ..
                    } => (
                        StatusCode::TOO_MANY_REQUESTS,
                        "RATE_LIMITED",
                        format!("Too many requests. Retry after {retry_after_secs} seconds."),
                        Some(*retry_after_secs),
                    ),
                    PipelineError::UpstreamTransient { .. }
                    | PipelineError::UpstreamFatal { .. }
                    | PipelineError::Cancelled => (
                        StatusCode::BAD_GATEWAY,
                        "PROCESSING_FAILED",
                        PROCESSING_FAILED_MESSAGE.to_string(),
                        None,
                    ),
                };

                let mut response =
                    ApiResponse::error(code, &message, request_id.to_string(), 0)
                        .into_response_with_status(status);
                insert_pipeline_headers(response.headers_mut(), request_id, &model, retry_after);
                response
            }
            AppError::Validation {
                request_id,
                model,
                message,
            } => {
                let mut response =
                    ApiResponse::error("VALIDATION_ERROR", &message, request_id.to_string(), 0)
                        .into_response_with_status(StatusCode::BAD_REQUEST);
                insert_pipeline_headers(response.headers_mut(), request_id, &model, None);
                response
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ApiResponse::error("INTERNAL_ERROR", "Internal server error", String::new(), 0)
                    .into_response_with_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
