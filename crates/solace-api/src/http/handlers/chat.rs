//! Streaming chat endpoint.
//!
//! POST /api/v1/chat/stream
//!
//! Runs the request pipeline and returns the upstream bytes unchanged as a
//! `text/event-stream` body. The full response is accumulated in the
//! background and persisted once the upstream finishes.

use std::time::Instant;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use solace_core::pipeline::PipelineRequest;
use solace_observe::fields::SPAN_CHAT_STREAM;
use solace_types::admission::Bucket;
use solace_types::llm::{GenerateRequest, Message};
use solace_types::transcript::AccumulationOutcome;

use crate::http::error::AppError;
use crate::http::identity::ClientKey;
use crate::http::response::insert_pipeline_headers;
use crate::state::AppState;

/// Request body for the streaming chat endpoint.
#[derive(Debug, Deserialize)]
pub struct StreamChatRequest {
    /// Journal session the transcript belongs to.
    pub session_id: Option<Uuid>,
    /// Overrides the configured upstream model.
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
}

pub async fn stream_chat(
    State(state): State<AppState>,
    ClientKey(identity): ClientKey,
    Json(body): Json<StreamChatRequest>,
) -> Result<Response, AppError> {
    let started = Instant::now();

    let request_id = Uuid::now_v7();
    let bucket = Bucket::Chat;
    let model = body
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.config.upstream.model.clone());

    if body.messages.is_empty() {
        return Err(AppError::Validation {
            request_id,
            model,
            message: "messages must not be empty".to_string(),
        });
    }

    let span = tracing::info_span!(
        SPAN_CHAT_STREAM,
        %request_id,
        identity = %identity,
        bucket = %bucket,
        model = %model,
    );

    let request = PipelineRequest {
        request_id,
        identity,
        bucket,
        session_id: body.session_id,
        generate: GenerateRequest {
            model: model.clone(),
            system_prompt: body.system_prompt,
            messages: body.messages,
            tools: None,
        },
    };

    // Cancelled when this handler future is dropped, e.g. the client hung
    // up while a retry was pending.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let response = state
        .pipeline
        .handle(request, &cancel)
        .instrument(span.clone())
        .await
        .map_err(|e| AppError::pipeline(request_id, model.as_str(), e))?;

    tokio::spawn(
        async move {
            match response.outcome.await {
                Ok(AccumulationOutcome::Persisted { bytes, truncated }) => {
                    tracing::debug!(bytes, truncated, "Transcript stored");
                }
                Ok(AccumulationOutcome::Skipped) => {
                    tracing::debug!("Empty response, nothing stored");
                }
                Ok(AccumulationOutcome::Failed { error }) => {
                    tracing::warn!(error = %error, "Transcript not stored");
                }
                Err(_) => tracing::debug!("Accumulation ended without an outcome"),
            }
        }
        .instrument(span),
    );

    let mut http_response = Body::from_stream(response.stream).into_response();
    let headers = http_response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    insert_pipeline_headers(headers, response.request_id, &response.model, None);

    tracing::debug!(
        %request_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Streaming response"
    );

    Ok(http_response)
}
