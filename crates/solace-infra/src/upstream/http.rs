//! OpenAI-compatible streaming generator over HTTP.
//!
//! Posts to `{base_url}/chat/completions` with `stream: true` and hands the
//! raw response body back as a byte stream. Frames are not decoded here; the
//! stream coordinator does that on its accumulation side.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use solace_core::generator::TextGenerator;
use solace_core::stream::ByteStream;
use solace_types::config::UpstreamConfig;
use solace_types::llm::{GenerateRequest, UpstreamError};

/// Longest slice of an error body carried into the error message.
const MAX_ERROR_BODY: usize = 512;

/// Streaming client for an OpenAI-compatible chat completions API.
///
/// Does NOT derive Debug: the API key must never end up in logs.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
}

impl HttpTextGenerator {
    pub fn new(config: &UpstreamConfig, api_key: Option<SecretString>) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UpstreamError::new(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build from config, reading the API key from `config.api_key_env`.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "No upstream API key set, sending unauthenticated requests"
            );
        }
        Self::new(config, api_key)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl TextGenerator for HttpTextGenerator {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<ByteStream, UpstreamError> {
        let mut builder = self
            .client
            .post(self.endpoint())
            .header("accept", "text/event-stream")
            .json(&request_body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_status(
                status.as_u16(),
                retry_after.as_deref(),
                &body,
                Utc::now(),
            ));
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| UpstreamError::new(format!("upstream stream failed: {e}")))
        });
        Ok(Box::pin(stream))
    }
}

/// Chat completions request body with streaming enabled.
fn request_body(request: &GenerateRequest) -> Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.system_prompt {
        messages.push(json!({"role": "system", "content": system}));
    }
    for message in &request.messages {
        messages.push(json!({"role": message.role.to_string(), "content": message.content}));
    }

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "stream": true,
    });
    if let Some(tools) = &request.tools {
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.clone());
        }
    }
    body
}

fn transport_error(e: reqwest::Error) -> UpstreamError {
    let error = UpstreamError::new(format!("HTTP request failed: {e}"));
    if e.is_connect() || e.is_timeout() {
        error.with_retryable(true)
    } else {
        error
    }
}

/// Map a non-2xx response to an `UpstreamError` carrying status and hints.
pub fn error_from_status(
    status: u16,
    retry_after: Option<&str>,
    body: &str,
    now: DateTime<Utc>,
) -> UpstreamError {
    let detail = error_message(body);
    let mut error = UpstreamError::new(format!("HTTP {status}: {detail}")).with_status(status);
    if let Some(ms) = retry_after.and_then(|v| parse_retry_after(v, now)) {
        error = error.with_retry_after_ms(ms);
    }
    error
}

/// `Retry-After` as either delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs.saturating_mul(1000));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let ms = (at - now).num_milliseconds();
    Some(ms.max(0) as u64)
}

/// Prefer the provider's `error.message`, else a bounded slice of the body.
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    if let Some(message) = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(Value::as_str)
    {
        return message.to_string();
    }

    let trimmed = body.trim();
    if trimmed.len() <= MAX_ERROR_BODY {
        return trimmed.to_string();
    }
    let mut cut = MAX_ERROR_BODY;
    while !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &trimmed[..cut])
}
