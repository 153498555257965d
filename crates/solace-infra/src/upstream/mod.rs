//! Upstream text-generation backends.

pub mod http;

pub use http::HttpTextGenerator;
