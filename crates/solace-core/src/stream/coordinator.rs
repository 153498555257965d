//! Tee of an upstream byte stream into a client view and a transcript.
//!
//! `wrap` spawns two tasks connected by unbounded channels:
//!
//! ```text
//! upstream ──► pump ──► client channel ──► ByteStream returned to caller
//!                 └───► accumulator channel ──► parse, accumulate, persist
//! ```
//!
//! The pump forwards each chunk to the client first and then to the
//! accumulator. Neither side can stall the other. If the client goes away
//! the pump stops reading upstream; the accumulator still drains whatever
//! was already read and persists it.

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;

use solace_types::llm::UpstreamError;
use solace_types::transcript::{AccumulationOutcome, TranscriptContext, TranscriptRecord};

use super::ByteStream;
use super::accumulator::StreamAccumulator;
use super::frame::{FrameParser, StreamFrame};
use crate::pipeline::RequestPhase;
use crate::transcript::BoxTranscriptSink;

/// Client-facing stream plus a handle on the persistence result.
pub struct CoordinatedStream {
    pub stream: ByteStream,
    /// Resolves once the accumulation side has finished, after the sink call.
    pub outcome: oneshot::Receiver<AccumulationOutcome>,
}

#[derive(Debug, Clone)]
pub struct StreamCoordinator {
    sink: BoxTranscriptSink,
    capacity_bytes: usize,
}

impl StreamCoordinator {
    pub fn new(sink: BoxTranscriptSink, capacity_bytes: usize) -> Self {
        Self {
            sink,
            capacity_bytes,
        }
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Tee `upstream` and return the client view.
    ///
    /// `guard` is held by the accumulation task and dropped right after the
    /// sink call returns, which is how an in-flight permit outlives the
    /// handler while the transcript is still being written.
    pub fn wrap<G>(
        &self,
        upstream: ByteStream,
        context: TranscriptContext,
        guard: G,
    ) -> CoordinatedStream
    where
        G: Send + 'static,
    {
        let (client_tx, client_rx) = mpsc::unbounded_channel::<Result<Bytes, UpstreamError>>();
        let (acc_tx, acc_rx) = mpsc::unbounded_channel::<Bytes>();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let request_id = context.request_id;
        tokio::spawn(pump(upstream, client_tx, acc_tx, request_id));

        let sink = self.sink.clone();
        let capacity = self.capacity_bytes;
        tokio::spawn(async move {
            let outcome = accumulate(acc_rx, capacity, &sink, &context).await;
            drop(guard);
            let _ = outcome_tx.send(outcome);
        });

        CoordinatedStream {
            stream: Box::pin(UnboundedReceiverStream::new(client_rx)),
            outcome: outcome_rx,
        }
    }
}

async fn pump(
    mut upstream: ByteStream,
    client_tx: mpsc::UnboundedSender<Result<Bytes, UpstreamError>>,
    acc_tx: mpsc::UnboundedSender<Bytes>,
    request_id: uuid::Uuid,
) {
    let mut chunks: u64 = 0;
    loop {
        let item = tokio::select! {
            biased;
            _ = client_tx.closed() => {
                tracing::debug!(%request_id, chunks, "Client disconnected, stopping upstream read");
                break;
            }
            item = upstream.next() => item,
        };

        match item {
            Some(Ok(chunk)) => {
                chunks += 1;
                // A send error means the client is gone; the next loop
                // iteration observes `closed()` and stops.
                let _ = client_tx.send(Ok(chunk.clone()));
                let _ = acc_tx.send(chunk);
            }
            Some(Err(e)) => {
                tracing::warn!(%request_id, error = %e, "Upstream failed mid-stream");
                let _ = client_tx.send(Err(e));
                break;
            }
            None => break,
        }
    }
}

async fn accumulate(
    mut acc_rx: mpsc::UnboundedReceiver<Bytes>,
    capacity: usize,
    sink: &BoxTranscriptSink,
    context: &TranscriptContext,
) -> AccumulationOutcome {
    let mut parser = FrameParser::new();
    let mut accumulator = StreamAccumulator::new(capacity);

    while let Some(chunk) = acc_rx.recv().await {
        for frame in parser.push(&chunk) {
            if let StreamFrame::TextDelta(text) = frame {
                accumulator.append(&text);
            }
        }
    }
    if let Some(StreamFrame::TextDelta(text)) = parser.finish() {
        accumulator.append(&text);
    }

    let (content, truncated) = accumulator.finish();
    let request_id = context.request_id;

    if content.trim().is_empty() {
        tracing::debug!(%request_id, "Nothing to persist");
        return AccumulationOutcome::Skipped;
    }
    if truncated {
        tracing::info!(%request_id, capacity, "Transcript truncated at capacity");
    }

    let bytes = content.len();
    tracing::debug!(%request_id, phase = %RequestPhase::Persisting, bytes, "Request phase");
    let record = TranscriptRecord::new(context, content, truncated);
    match sink.persist(record).await {
        Ok(()) => {
            tracing::debug!(%request_id, bytes, truncated, "Transcript persisted");
            AccumulationOutcome::Persisted { bytes, truncated }
        }
        Err(e) => {
            tracing::warn!(%request_id, error = %e, "Transcript persistence failed");
            AccumulationOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::transcript::InMemoryTranscriptSink;

    fn context() -> TranscriptContext {
        TranscriptContext {
            request_id: uuid::Uuid::now_v7(),
            session_id: Some(uuid::Uuid::now_v7()),
            model: "test-model".to_string(),
        }
    }

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    fn upstream_from(chunks: Vec<Vec<u8>>) -> ByteStream {
        Box::pin(async_stream::stream! {
            for chunk in chunks {
                yield Ok(Bytes::from(chunk));
            }
        })
    }

    async fn collect(mut stream: ByteStream) -> (Vec<u8>, Option<UpstreamError>) {
        let mut bytes = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(e) => return (bytes, Some(e)),
            }
        }
        (bytes, None)
    }

    #[tokio::test]
    async fn client_sees_exact_bytes_and_transcript_is_persisted() {
        let sink = Arc::new(InMemoryTranscriptSink::new());
        let coordinator = StreamCoordinator::new(BoxTranscriptSink::from_arc(sink.clone()), 1024);

        let body = format!(
            "{}{}{}data: [DONE]\n\n",
            delta("Writing "),
            delta("helps me "),
            delta("unwind ✨")
        );
        // Split reads at awkward places, including inside a multi-byte char.
        let raw = body.as_bytes().to_vec();
        let sparkle = raw.iter().position(|b| *b == 0xE2).unwrap();
        let chunks = vec![
            raw[..7].to_vec(),
            raw[7..sparkle + 1].to_vec(),
            raw[sparkle + 1..].to_vec(),
        ];

        let ctx = context();
        let coordinated = coordinator.wrap(upstream_from(chunks), ctx.clone(), ());
        let (received, error) = collect(coordinated.stream).await;

        assert_eq!(received, raw);
        assert!(error.is_none());

        let outcome = coordinated.outcome.await.unwrap();
        let expected = "Writing helps me unwind ✨";
        assert_eq!(
            outcome,
            AccumulationOutcome::Persisted {
                bytes: expected.len(),
                truncated: false
            }
        );

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, expected);
        assert_eq!(records[0].request_id, ctx.request_id);
        assert_eq!(records[0].session_id, ctx.session_id);
        assert!(!records[0].truncated);
    }

    #[tokio::test]
    async fn persists_before_client_reads_anything() {
        let sink = Arc::new(InMemoryTranscriptSink::new());
        let coordinator = StreamCoordinator::new(BoxTranscriptSink::from_arc(sink.clone()), 1024);

        let chunks: Vec<Vec<u8>> = vec![
            delta("Nobody ").into_bytes(),
            delta("is reading ").into_bytes(),
            delta("yet.").into_bytes(),
            b"data: [DONE]\n\n".to_vec(),
        ];
        let raw = chunks.concat();

        let CoordinatedStream { stream, outcome } =
            coordinator.wrap(upstream_from(chunks), context(), ());

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), outcome)
            .await
            .expect("accumulation stalled behind an unread client stream")
            .unwrap();
        assert_eq!(
            outcome,
            AccumulationOutcome::Persisted {
                bytes: "Nobody is reading yet.".len(),
                truncated: false
            }
        );
        assert_eq!(sink.records()[0].content, "Nobody is reading yet.");

        let (received, error) = collect(stream).await;
        assert_eq!(received, raw);
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn truncates_transcript_but_not_client_stream() {
        let sink = Arc::new(InMemoryTranscriptSink::new());
        let coordinator = StreamCoordinator::new(BoxTranscriptSink::from_arc(sink.clone()), 12);

        let chunks: Vec<Vec<u8>> = ["I slept ", "badly but ", "woke up ", "hopeful."]
            .iter()
            .map(|t| delta(t).into_bytes())
            .collect();
        let expected_client: Vec<u8> = chunks.concat();

        let coordinated = coordinator.wrap(upstream_from(chunks), context(), ());
        let (received, _) = collect(coordinated.stream).await;
        assert_eq!(received, expected_client);

        let outcome = coordinated.outcome.await.unwrap();
        assert_eq!(
            outcome,
            AccumulationOutcome::Persisted {
                bytes: 12,
                truncated: true
            }
        );
        let records = sink.records();
        assert_eq!(records[0].content, "I slept badl");
        assert!(records[0].truncated);
    }

    #[tokio::test]
    async fn whitespace_only_is_skipped() {
        let sink = Arc::new(InMemoryTranscriptSink::new());
        let coordinator = StreamCoordinator::new(BoxTranscriptSink::from_arc(sink.clone()), 1024);

        let chunks = vec![
            delta("  ").into_bytes(),
            delta("\n").into_bytes(),
            b"data: [DONE]\n\n".to_vec(),
        ];
        let coordinated = coordinator.wrap(upstream_from(chunks), context(), ());
        let _ = collect(coordinated.stream).await;

        assert_eq!(
            coordinated.outcome.await.unwrap(),
            AccumulationOutcome::Skipped
        );
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn empty_upstream_is_skipped() {
        let sink = Arc::new(InMemoryTranscriptSink::new());
        let coordinator = StreamCoordinator::new(BoxTranscriptSink::from_arc(sink.clone()), 1024);

        let coordinated = coordinator.wrap(upstream_from(Vec::new()), context(), ());
        let (received, error) = collect(coordinated.stream).await;
        assert!(received.is_empty());
        assert!(error.is_none());
        assert_eq!(
            coordinated.outcome.await.unwrap(),
            AccumulationOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn persistence_failure_does_not_touch_client() {
        let sink = InMemoryTranscriptSink::failing("disk full");
        let coordinator = StreamCoordinator::new(BoxTranscriptSink::new(sink), 1024);

        let chunks = vec![delta("kept anyway").into_bytes()];
        let expected = chunks.concat();
        let coordinated = coordinator.wrap(upstream_from(chunks), context(), ());
        let (received, error) = collect(coordinated.stream).await;

        assert_eq!(received, expected);
        assert!(error.is_none());
        match coordinated.outcome.await.unwrap() {
            AccumulationOutcome::Failed { error } => assert!(error.contains("disk full")),
            other => panic!("expected failure outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mid_stream_error_reaches_client_and_partial_text_persists() {
        let sink = Arc::new(InMemoryTranscriptSink::new());
        let coordinator = StreamCoordinator::new(BoxTranscriptSink::from_arc(sink.clone()), 1024);

        let first = delta("partial thought");
        let upstream: ByteStream = Box::pin(async_stream::stream! {
            yield Ok(Bytes::from(first.clone()));
            yield Err(UpstreamError::new("connection reset by peer"));
        });

        let coordinated = coordinator.wrap(upstream, context(), ());
        let (received, error) = collect(coordinated.stream).await;
        assert_eq!(received, delta("partial thought").into_bytes());
        assert_eq!(error.unwrap().message, "connection reset by peer");

        assert!(matches!(
            coordinated.outcome.await.unwrap(),
            AccumulationOutcome::Persisted { .. }
        ));
        assert_eq!(sink.records()[0].content, "partial thought");
    }

    #[tokio::test]
    async fn client_disconnect_persists_what_was_read_and_drops_guard() {
        let sink = Arc::new(InMemoryTranscriptSink::new());
        let coordinator = StreamCoordinator::new(BoxTranscriptSink::from_arc(sink.clone()), 1024);

        let first = delta("before the tab closed");
        let upstream: ByteStream = Box::pin(async_stream::stream! {
            yield Ok(Bytes::from(first.clone()));
            std::future::pending::<()>().await;
        });

        let (guard_tx, guard_rx) = oneshot::channel::<()>();
        let mut coordinated = coordinator.wrap(upstream, context(), guard_tx);

        let first_chunk = coordinated.stream.next().await.unwrap().unwrap();
        assert_eq!(first_chunk, Bytes::from(delta("before the tab closed")));
        drop(coordinated.stream);

        let outcome = coordinated.outcome.await.unwrap();
        assert!(matches!(outcome, AccumulationOutcome::Persisted { .. }));
        assert_eq!(sink.records()[0].content, "before the tab closed");

        // The guard (a oneshot sender) was dropped without sending.
        assert!(guard_rx.await.is_err());
    }
}
