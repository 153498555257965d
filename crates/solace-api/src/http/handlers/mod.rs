//! Request handlers, one module per resource.

pub mod chat;
pub mod health;
pub mod stats;
