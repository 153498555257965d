//! Drop guard for an admitted request's in-flight slot.

use std::sync::Arc;

use solace_types::admission::{AdmissionDecision, Bucket};
use solace_types::error::PipelineError;
use solace_types::identity::ClientIdentity;

use super::controller::AdmissionController;

/// Holds one in-flight slot for an identity until released or dropped.
///
/// Whichever happens first of `release()` or `Drop` returns the slot; the
/// other is a no-op. Every exit path of a request, including a future being
/// dropped mid-await, therefore releases exactly once.
#[derive(Debug)]
pub struct InFlightPermit {
    controller: Arc<AdmissionController>,
    identity: ClientIdentity,
    released: bool,
}

impl InFlightPermit {
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Release the slot now rather than at drop.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.controller.release(&self.identity);
        }
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl AdmissionController {
    /// Admit `identity` and wrap the taken slot in a permit.
    pub fn acquire(
        self: &Arc<Self>,
        identity: &ClientIdentity,
        bucket: Bucket,
    ) -> Result<InFlightPermit, PipelineError> {
        match self.try_admit(identity, bucket) {
            AdmissionDecision::Allowed => Ok(InFlightPermit {
                controller: Arc::clone(self),
                identity: identity.clone(),
                released: false,
            }),
            AdmissionDecision::Denied {
                retry_after_secs,
                reason,
            } => Err(PipelineError::AdmissionDenied {
                retry_after_secs,
                reason,
            }),
        }
    }
}
