//! Read-only audit view of the registry log.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::app::{errors, services::AppServices};

const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Only events with a sequence number above this.
    #[serde(default)]
    pub after: u64,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn registry_events(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<EventsQuery>,
) -> axum::response::Response {
    let history = match services.registry.history() {
        Ok(h) => h,
        Err(e) => return errors::service_error_to_response(e),
    };

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let items = history
        .into_iter()
        .filter(|env| env.sequence_number() > query.after)
        .take(limit)
        .collect::<Vec<_>>();
    let next_after = items.last().map(|env| env.sequence_number());

    (
        StatusCode::OK,
        Json(serde_json::json!({ "items": items, "next_after": next_after })),
    )
        .into_response()
}
