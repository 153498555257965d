//! TranscriptSink trait definition.
//!
//! Implementations live in solace-infra (e.g., `SqliteTranscriptStore`).

use solace_types::error::PersistenceError;
use solace_types::transcript::TranscriptRecord;

/// Durable storage for completed assistant responses.
///
/// Called at most once per response, from the coordinator's accumulation
/// task and never on the client's path.
pub trait TranscriptSink: Send + Sync {
    fn persist(
        &self,
        record: TranscriptRecord,
    ) -> impl std::future::Future<Output = Result<(), PersistenceError>> + Send;
}
