//! Per-client admission control.
//!
//! - `AdmissionController`: window and in-flight counters keyed by identity
//! - `InFlightPermit`: RAII guard that returns an in-flight slot exactly once
//! - `SweepScheduler`: background eviction of expired counter entries

pub mod controller;
pub mod permit;
pub mod sweeper;

pub use controller::AdmissionController;
pub use permit::InFlightPermit;
pub use sweeper::SweepScheduler;
