//! Request orchestration: admission, upstream call with retry, stream tee.
//!
//! ```text
//! Admitting ──deny──► (done, nothing to release)
//!     │
//!     ▼
//! Upstreaming{attempt} ──fail──► Released
//!     │
//!     ▼
//! Streaming ──► Persisting ──► Released
//! ```
//!
//! Once admitted, the in-flight permit is owned by whatever runs last: the
//! handler future while upstreaming, then the coordinator's accumulation
//! task. Dropping either releases the slot.

use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use solace_types::admission::Bucket;
use solace_types::error::PipelineError;
use solace_types::identity::ClientIdentity;
use solace_types::llm::GenerateRequest;
use solace_types::retry::RetryPolicy;
use solace_types::transcript::{AccumulationOutcome, TranscriptContext};

use crate::admission::{AdmissionController, InFlightPermit};
use crate::generator::BoxTextGenerator;
use crate::retry::{RetryFailure, with_retry};
use crate::stream::{ByteStream, StreamCoordinator};

/// Lifecycle position of a request, used in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Admitting,
    Upstreaming { attempt: u32 },
    Streaming,
    Persisting,
    Released,
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestPhase::Admitting => write!(f, "admitting"),
            RequestPhase::Upstreaming { attempt } => write!(f, "upstreaming#{attempt}"),
            RequestPhase::Streaming => write!(f, "streaming"),
            RequestPhase::Persisting => write!(f, "persisting"),
            RequestPhase::Released => write!(f, "released"),
        }
    }
}

/// Everything the pipeline needs to serve one chat request.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub request_id: Uuid,
    pub identity: ClientIdentity,
    pub bucket: Bucket,
    pub session_id: Option<Uuid>,
    pub generate: GenerateRequest,
}

pub struct PipelineResponse {
    pub request_id: Uuid,
    pub model: String,
    /// Upstream bytes, unmodified.
    pub stream: ByteStream,
    pub outcome: oneshot::Receiver<AccumulationOutcome>,
}

impl fmt::Debug for PipelineResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineResponse")
            .field("request_id", &self.request_id)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Permit wrapper that logs the final phase when the slot is returned.
struct ReleaseGuard {
    request_id: Uuid,
    _permit: InFlightPermit,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        tracing::debug!(
            request_id = %self.request_id,
            phase = %RequestPhase::Released,
            "Request phase"
        );
    }
}

pub struct RequestPipeline {
    admission: Arc<AdmissionController>,
    generator: BoxTextGenerator,
    coordinator: StreamCoordinator,
    retry_policy: RetryPolicy,
}

impl RequestPipeline {
    pub fn new(
        admission: Arc<AdmissionController>,
        generator: BoxTextGenerator,
        coordinator: StreamCoordinator,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            admission,
            generator,
            coordinator,
            retry_policy,
        }
    }

    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Run one request through admission, upstream and the stream coordinator.
    ///
    /// Returns before the first byte is streamed; everything after that is
    /// owned by the returned stream and the background accumulation task.
    pub async fn handle(
        &self,
        request: PipelineRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineResponse, PipelineError> {
        let request_id = request.request_id;
        tracing::debug!(
            %request_id,
            identity = %request.identity,
            bucket = %request.bucket,
            phase = %RequestPhase::Admitting,
            "Request phase"
        );

        let permit = match self.admission.acquire(&request.identity, request.bucket) {
            Ok(permit) => permit,
            Err(e) => {
                tracing::info!(
                    %request_id,
                    identity = %request.identity,
                    bucket = %request.bucket,
                    error = %e,
                    "Request denied"
                );
                return Err(e);
            }
        };
        let guard = ReleaseGuard {
            request_id,
            _permit: permit,
        };

        let generator = &self.generator;
        let generate = &request.generate;
        let upstream = with_retry(&self.retry_policy, cancel, move |attempt| {
            tracing::debug!(
                %request_id,
                phase = %RequestPhase::Upstreaming { attempt },
                generator = generator.name(),
                "Request phase"
            );
            generator.generate(generate)
        })
        .await;

        let upstream = match upstream {
            Ok(stream) => stream,
            Err(failure) => {
                drop(guard);
                let error = pipeline_error(failure);
                tracing::warn!(%request_id, error = %error, "Upstream call failed");
                return Err(error);
            }
        };

        tracing::debug!(%request_id, phase = %RequestPhase::Streaming, "Request phase");

        let model = request.generate.model.clone();
        let context = TranscriptContext {
            request_id,
            session_id: request.session_id,
            model: model.clone(),
        };
        let coordinated = self.coordinator.wrap(upstream, context, guard);

        Ok(PipelineResponse {
            request_id,
            model,
            stream: coordinated.stream,
            outcome: coordinated.outcome,
        })
    }
}

fn pipeline_error(failure: RetryFailure) -> PipelineError {
    if failure.cancelled {
        return PipelineError::Cancelled;
    }
    if failure.classification.retryable {
        PipelineError::UpstreamTransient {
            attempts: failure.attempts,
            category: failure.classification.category,
            source: failure.error,
        }
    } else {
        PipelineError::UpstreamFatal {
            category: failure.classification.category,
            source: failure.error,
        }
    }
}
