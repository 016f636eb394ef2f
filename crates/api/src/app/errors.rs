use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use carbonsense_compliance::ComplianceError;
use carbonsense_core::DomainError;
use carbonsense_infra::event_store::EventStoreError;
use carbonsense_infra::{DirectoryError, ServiceError};
use carbonsense_registry::RegistryError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what}"))
}

pub fn registry_error_to_response(err: RegistryError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        RegistryError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        RegistryError::ProjectNotFound(_) | RegistryError::VerificationNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", message)
        }
        RegistryError::AlreadyApproved(_) => json_error(StatusCode::CONFLICT, "already_approved", message),
        RegistryError::InsufficientCredits { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_credits", message)
        }
    }
}

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Registry(e) => registry_error_to_response(e),
        ServiceError::Store(EventStoreError::Concurrency(msg)) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "registry log failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        ServiceError::Deserialize { .. } | ServiceError::Poisoned => {
            tracing::error!(error = %err, "registry unavailable");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
        }
    }
}

pub fn directory_error_to_response(err: DirectoryError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DirectoryError::DuplicateEmail(_) => json_error(StatusCode::CONFLICT, "duplicate_email", message),
        DirectoryError::NotFound(_) | DirectoryError::Domain(DomainError::NotFound) => {
            json_error(StatusCode::NOT_FOUND, "not_found", message)
        }
        DirectoryError::Domain(DomainError::Conflict(_)) => json_error(StatusCode::CONFLICT, "conflict", message),
        DirectoryError::Domain(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DirectoryError::Storage(_) | DirectoryError::Poisoned => {
            tracing::error!(error = %message, "company storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message)
        }
    }
}

pub fn compliance_error_to_response(err: ComplianceError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        ComplianceError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        ComplianceError::UnknownIndustry(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "unknown_industry", message)
        }
        ComplianceError::DivisionByZero => json_error(StatusCode::UNPROCESSABLE_ENTITY, "zero_benchmark", message),
    }
}
