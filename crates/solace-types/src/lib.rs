//! Shared domain types for Solace.
//!
//! This crate contains the types that flow through the streaming response
//! pipeline: client identities and admission buckets, retry configuration,
//! upstream request shapes, transcript records, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod admission;
pub mod config;
pub mod error;
pub mod identity;
pub mod llm;
pub mod retry;
pub mod transcript;
