//! In-process transcript sink.
//!
//! Keeps records in memory. Used by tests and by `solace serve --no-persist`.

use std::sync::{Mutex, PoisonError};

use solace_types::error::PersistenceError;
use solace_types::transcript::TranscriptRecord;

use super::sink::TranscriptSink;

#[derive(Debug, Default)]
pub struct InMemoryTranscriptSink {
    records: Mutex<Vec<TranscriptRecord>>,
    fail_with: Option<String>,
}

impl InMemoryTranscriptSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every `persist` call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    pub fn records(&self) -> Vec<TranscriptRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TranscriptSink for InMemoryTranscriptSink {
    async fn persist(&self, record: TranscriptRecord) -> Result<(), PersistenceError> {
        if let Some(message) = &self.fail_with {
            return Err(PersistenceError::Storage(message.clone()));
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}
