//! BoxTranscriptSink: object-safe wrapper for TranscriptSink.
//!
//! Same layout as `BoxTextGenerator`: a `*Dyn` trait with boxed futures,
//! a blanket impl, and a cloneable handle that delegates.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use solace_types::error::PersistenceError;
use solace_types::transcript::TranscriptRecord;

use super::sink::TranscriptSink;

/// Object-safe version of [`TranscriptSink`].
pub trait TranscriptSinkDyn: Send + Sync {
    fn persist_boxed(
        &self,
        record: TranscriptRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), PersistenceError>> + Send + '_>>;
}

impl<T: TranscriptSink> TranscriptSinkDyn for T {
    fn persist_boxed(
        &self,
        record: TranscriptRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), PersistenceError>> + Send + '_>> {
        Box::pin(self.persist(record))
    }
}

/// Type-erased, cheaply cloneable transcript sink.
///
/// Cloned into every coordinator task, so the inner sink is shared.
#[derive(Clone)]
pub struct BoxTranscriptSink {
    inner: Arc<dyn TranscriptSinkDyn>,
}

impl BoxTranscriptSink {
    pub fn new<T: TranscriptSink + 'static>(sink: T) -> Self {
        Self {
            inner: Arc::new(sink),
        }
    }

    /// Wrap a sink that is already shared elsewhere.
    pub fn from_arc<T: TranscriptSink + 'static>(sink: Arc<T>) -> Self {
        Self { inner: sink }
    }

    pub async fn persist(&self, record: TranscriptRecord) -> Result<(), PersistenceError> {
        self.inner.persist_boxed(record).await
    }
}

impl std::fmt::Debug for BoxTranscriptSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxTranscriptSink").finish_non_exhaustive()
    }
}
