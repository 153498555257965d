use thiserror::Error;

use crate::admission::DenyReason;
use crate::llm::UpstreamError;
use crate::retry::ErrorCategory;

/// Errors a request can end with before any bytes reach the client.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("admission denied ({reason}), retry after {retry_after_secs}s")]
    AdmissionDenied {
        retry_after_secs: u64,
        reason: DenyReason,
    },

    #[error("upstream failed after {attempts} attempts ({category}): {source}")]
    UpstreamTransient {
        attempts: u32,
        category: ErrorCategory,
        #[source]
        source: UpstreamError,
    },

    #[error("upstream rejected the request ({category}): {source}")]
    UpstreamFatal {
        category: ErrorCategory,
        #[source]
        source: UpstreamError,
    },

    #[error("request cancelled while waiting to retry")]
    Cancelled,
}

/// Failure writing a transcript. Logged, never surfaced to the client.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("persistence task aborted")]
    Aborted,
}

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,
}

impl From<RepositoryError> for PersistenceError {
    fn from(e: RepositoryError) -> Self {
        PersistenceError::Storage(e.to_string())
    }
}

/// Configuration that parsed but cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
