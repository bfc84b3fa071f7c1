// tally-core/src/error.rs

use crate::domain::error::DomainError;
use crate::infrastructure::error::InfrastructureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    // Records, rules, guard
    #[error(transparent)]
    Domain(#[from] DomainError),

    // IO, parsing, DuckDB, templates
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    #[error("Internal Error: {0}")]
    InternalError(String),

    #[error("Unsafe path traversal detected: {0}")]
    UnsafePath(String),
}

impl From<std::io::Error> for TallyError {
    fn from(err: std::io::Error) -> Self {
        TallyError::Infrastructure(InfrastructureError::Io(err))
    }
}

impl From<crate::domain::error::HallucinationGuardError> for TallyError {
    fn from(err: crate::domain::error::HallucinationGuardError) -> Self {
        TallyError::Domain(DomainError::HallucinationGuard(err))
    }
}

impl TallyError {
    /// True when a downstream claim was rejected by the guard.
    pub fn is_guard_rejection(&self) -> bool {
        matches!(self, TallyError::Domain(DomainError::HallucinationGuard(_)))
    }
}
