//! Transcript records handed to the persistence sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request-scoped data the coordinator attaches to a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptContext {
    pub request_id: Uuid,
    pub session_id: Option<Uuid>,
    pub model: String,
}

/// One assistant response as it is written to storage.
///
/// Carries no client identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub id: Uuid,
    pub request_id: Uuid,
    pub session_id: Option<Uuid>,
    pub model: String,
    pub content: String,
    pub truncated: bool,
    pub created_at: DateTime<Utc>,
}

impl TranscriptRecord {
    pub fn new(context: &TranscriptContext, content: String, truncated: bool) -> Self {
        Self {
            id: Uuid::now_v7(),
            request_id: context.request_id,
            session_id: context.session_id,
            model: context.model.clone(),
            content,
            truncated,
            created_at: Utc::now(),
        }
    }
}

/// What happened on the accumulation side once the stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulationOutcome {
    Persisted { bytes: usize, truncated: bool },
    /// Nothing but whitespace was accumulated; the sink was not called.
    Skipped,
    Failed { error: String },
}
