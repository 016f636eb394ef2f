//! Credit marketplace and registry emissions.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::{dto, errors, services::{self, AppServices}};

pub fn router() -> Router {
    Router::new()
        .route("/marketplace", get(list_marketplace))
        .route("/marketplace/purchase", post(purchase_credits))
        .route("/emissions", post(record_emissions))
}

pub async fn list_marketplace(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.registry.read(|r| r.listings()) {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn purchase_credits(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::PurchaseRequest>,
) -> axum::response::Response {
    let purchased = services::blocking(
        &services,
        move |s| {
            s.registry
                .purchase(body.buyer, body.seller, body.amount, body.price_per_ton)
        },
        errors::service_error_to_response,
    )
    .await;
    match purchased {
        Ok(transfer) => {
            let total_cost = transfer.total_cost();
            (
                StatusCode::OK,
                Json(serde_json::json!({ "transfer": transfer, "total_cost": total_cost })),
            )
                .into_response()
        }
        Err(resp) => resp,
    }
}

pub async fn record_emissions(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RecordEmissionsRequest>,
) -> axum::response::Response {
    let company = body.company.clone();
    let recorded = services::blocking(
        &services,
        move |s| s.registry.record_emissions(body.company, body.amount_tonnes),
        errors::service_error_to_response,
    )
    .await;
    match recorded {
        Ok(total) => (
            StatusCode::OK,
            Json(serde_json::json!({ "company": company, "total_emissions": total })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}
