//! Span names shared across crates.
//!
//! Span names end up in static metadata, so they must be constants.

/// One streamed chat request, from admission to the last byte handed to axum.
pub const SPAN_CHAT_STREAM: &str = "chat.stream";

/// The HTTP server's lifetime.
pub const SPAN_SERVE: &str = "serve";

/// Service name reported to OpenTelemetry.
pub const SERVICE_NAME: &str = "solace";
