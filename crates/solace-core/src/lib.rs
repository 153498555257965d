//! Streaming response coordination for Solace.
//!
//! This crate defines the ports (generator, transcript sink, identity
//! resolver) that the infrastructure layer implements, plus the core
//! machinery that runs between them: admission control, retry with backoff,
//! stream fan-out, and the request pipeline. It depends only on
//! `solace-types` -- never on `solace-infra` or any database/HTTP crate.

pub mod admission;
pub mod generator;
pub mod identity;
pub mod pipeline;
pub mod retry;
pub mod stream;
pub mod transcript;
