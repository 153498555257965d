//! SQLite storage layer.
//!
//! WAL mode with split read/write connection pools.

pub mod pool;
pub mod transcript;
