//! Observability setup for Solace: subscriber initialization and shared
//! span names.

pub mod fields;
pub mod tracing_setup;
