//! HTTP layer for Solace.
//!
//! Axum router at `/api/v1/` streaming chat responses, with the envelope
//! error format and CORS support.

pub mod error;
pub mod handlers;
pub mod identity;
pub mod response;
pub mod router;
