//! Transcript persistence port.

pub mod box_sink;
pub mod memory;
pub mod sink;

pub use box_sink::BoxTranscriptSink;
pub use memory::InMemoryTranscriptSink;
pub use sink::TranscriptSink;
