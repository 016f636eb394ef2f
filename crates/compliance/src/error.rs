use thiserror::Error;

use carbonsense_core::DomainError;

/// Failures raised by the compliance assessor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComplianceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no benchmark for industry '{0}'")]
    UnknownIndustry(String),

    #[error("scaled benchmark is zero; performance ratio is undefined")]
    DivisionByZero,
}

impl From<DomainError> for ComplianceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg)
            | DomainError::InvalidId(msg)
            | DomainError::Conflict(msg) => ComplianceError::Validation(msg),
            DomainError::NotFound => ComplianceError::Validation("not found".to_string()),
        }
    }
}
