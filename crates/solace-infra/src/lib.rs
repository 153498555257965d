//! Infrastructure layer for Solace.
//!
//! Implements the ports defined in `solace-core`: SQLite transcript storage
//! and the HTTP upstream generator. Also owns config loading and data
//! directory resolution.

pub mod config;
pub mod filesystem;
pub mod sqlite;
pub mod upstream;
