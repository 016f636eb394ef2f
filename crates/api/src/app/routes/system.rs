use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::{errors, services::AppServices};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn stats(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.registry.read(|r| r.stats()) {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn benchmarks(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let rates = services.assessor.rates();
    let items = services.assessor.benchmarks().iter().cloned().collect::<Vec<_>>();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "tax_rate_per_tonne": rates.tax_rate_per_tonne,
            "credit_rate_per_tonne": rates.credit_rate_per_tonne,
            "items": items,
        })),
    )
        .into_response()
}
