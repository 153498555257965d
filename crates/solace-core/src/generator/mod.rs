//! Upstream text-generation port.

pub mod box_generator;
pub mod provider;

pub use box_generator::BoxTextGenerator;
pub use provider::TextGenerator;
