use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use carbonsense_infra::NewProject;
use carbonsense_registry::{ProjectId, VerificationId};

use crate::app::{dto, errors, services::{self, AppServices}};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_project).get(list_projects))
        .route("/:id", get(get_project))
}

pub fn verification_router() -> Router {
    Router::new()
        .route("/", post(submit_verification))
        .route("/pending", get(pending_verifications))
        .route("/:id/approve", post(approve_verification))
}

pub async fn register_project(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewProject>,
) -> axum::response::Response {
    let registered = services::blocking(
        &services,
        move |s| s.registry.register_project(body),
        errors::service_error_to_response,
    )
    .await;
    match registered {
        Ok(project) => (StatusCode::CREATED, Json(project)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn list_projects(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.registry.read(|r| r.projects().cloned().collect::<Vec<_>>()) {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_project(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Ok(project_id) = id.parse::<ProjectId>() else {
        return errors::invalid_id("project id");
    };

    let detail = services.registry.read(|r| {
        r.project(project_id).cloned().map(|project| dto::ProjectDetail {
            project,
            verifications: r.verifications_for(project_id).into_iter().cloned().collect(),
        })
    });

    match detail {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "project not found"),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn submit_verification(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SubmitVerificationRequest>,
) -> axum::response::Response {
    let submitted = services::blocking(
        &services,
        move |s| {
            s.registry.submit_verification(
                body.project_id,
                body.verified_amount,
                body.verifier,
                body.verification_data,
                body.comments,
            )
        },
        errors::service_error_to_response,
    )
    .await;
    match submitted {
        Ok(id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "verification_id": id, "is_approved": false })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

pub async fn pending_verifications(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services
        .registry
        .read(|r| r.pending_verifications().into_iter().cloned().collect::<Vec<_>>())
    {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn approve_verification(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Ok(verification_id) = id.parse::<VerificationId>() else {
        return errors::invalid_id("verification id");
    };

    let approved = services::blocking(
        &services,
        move |s| s.registry.approve_verification(verification_id),
        errors::service_error_to_response,
    )
    .await;
    match approved {
        Ok(lot) => (StatusCode::OK, Json(serde_json::json!({ "credit_lot": lot }))).into_response(),
        Err(resp) => resp,
    }
}
