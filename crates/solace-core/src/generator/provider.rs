//! TextGenerator trait definition.
//!
//! Implementations live in solace-infra (e.g., `HttpTextGenerator`).

use solace_types::llm::{GenerateRequest, UpstreamError};

use crate::stream::ByteStream;

/// A streaming text-generation backend.
///
/// `generate` resolves once the upstream has accepted the request; an error
/// here is a pre-stream failure and may be retried. Errors yielded by the
/// returned stream happen mid-stream and are never retried.
pub trait TextGenerator: Send + Sync {
    /// Backend name used in logs (e.g., "openai").
    fn name(&self) -> &str;

    fn generate(
        &self,
        request: &GenerateRequest,
    ) -> impl std::future::Future<Output = Result<ByteStream, UpstreamError>> + Send;
}
