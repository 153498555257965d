//! Upstream stream handling.
//!
//! - `frame`: incremental parser for `data:`-framed event lines
//! - `accumulator`: capacity-bounded text buffer for the transcript
//! - `coordinator`: tees upstream bytes to the client and the accumulator

pub mod accumulator;
pub mod coordinator;
pub mod frame;

use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

use solace_types::llm::UpstreamError;

pub use accumulator::StreamAccumulator;
pub use coordinator::{CoordinatedStream, StreamCoordinator};
pub use frame::{FrameParser, StreamFrame};

/// Raw upstream bytes, exactly as they should reach the client.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send + 'static>>;
