//! BoxTextGenerator: object-safe wrapper for TextGenerator.
//!
//! 1. `TextGeneratorDyn` is the object-safe trait with boxed futures
//! 2. every `T: TextGenerator` gets it through a blanket impl
//! 3. `BoxTextGenerator` holds `Arc<dyn TextGeneratorDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use solace_types::llm::{GenerateRequest, UpstreamError};

use super::provider::TextGenerator;
use crate::stream::ByteStream;

/// Object-safe version of [`TextGenerator`].
pub trait TextGeneratorDyn: Send + Sync {
    fn name(&self) -> &str;

    fn generate_boxed<'a>(
        &'a self,
        request: &'a GenerateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, UpstreamError>> + Send + 'a>>;
}

impl<T: TextGenerator> TextGeneratorDyn for T {
    fn name(&self) -> &str {
        TextGenerator::name(self)
    }

    fn generate_boxed<'a>(
        &'a self,
        request: &'a GenerateRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ByteStream, UpstreamError>> + Send + 'a>> {
        Box::pin(self.generate(request))
    }
}

/// Type-erased generator chosen at startup.
#[derive(Clone)]
pub struct BoxTextGenerator {
    inner: Arc<dyn TextGeneratorDyn>,
}

impl BoxTextGenerator {
    pub fn new<T: TextGenerator + 'static>(generator: T) -> Self {
        Self {
            inner: Arc::new(generator),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<ByteStream, UpstreamError> {
        self.inner.generate_boxed(request).await
    }
}

impl std::fmt::Debug for BoxTextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxTextGenerator")
            .field("name", &self.name())
            .finish()
    }
}
