//! Advisory gate port.

use crate::domain::advisory::{AdvisoryRequest, AdvisoryResponse};
use crate::domain::error::AdvisoryError;

/// An external second opinion on a candidate entry.
///
/// Implementations may block; callers that need a bound wrap the gate in
/// [`crate::adapters::advisory_stub::TimeoutGate`].
pub trait AdvisoryGate {
    fn approve(&self, request: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError>;
}

impl<G: AdvisoryGate + ?Sized> AdvisoryGate for &G {
    fn approve(&self, request: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
        (**self).approve(request)
    }
}

impl<G: AdvisoryGate + ?Sized> AdvisoryGate for Box<G> {
    fn approve(&self, request: &AdvisoryRequest) -> Result<AdvisoryResponse, AdvisoryError> {
        (**self).approve(request)
    }
}
