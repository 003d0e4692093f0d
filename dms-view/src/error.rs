use dms_core::DmsError;
use thiserror::Error;

use crate::breadcrumb::BreadcrumbError;

#[derive(Debug, Error)]
pub enum ViewError {
    /// Usage error caught before anything is sent to the remote side.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("remote call failed: {0}")]
    Namespace(#[from] DmsError),
    #[error("breadcrumb resolution failed: {0}")]
    Breadcrumb(#[from] BreadcrumbError),
    #[error("view controller has shut down")]
    Closed,
}

impl ViewError {
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, ViewError::InvariantViolation(_))
    }
}
