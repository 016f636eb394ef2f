use thiserror::Error;

use carbonsense_core::DomainError;

use crate::project::ProjectId;
use crate::verification::VerificationId;

/// Failures raised by registry commands.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("project {0} does not exist")]
    ProjectNotFound(ProjectId),

    #[error("verification {0} does not exist")]
    VerificationNotFound(VerificationId),

    #[error("verification {0} already approved")]
    AlreadyApproved(VerificationId),

    #[error("seller has insufficient credits (available: {available}, requested: {requested})")]
    InsufficientCredits { available: f64, requested: f64 },
}

impl From<DomainError> for RegistryError {
    fn from(value: DomainError) -> Self {
        RegistryError::Validation(value.to_string())
    }
}
