use axum::{routing::get, Router};

pub mod companies;
pub mod events;
pub mod marketplace;
pub mod projects;
pub mod system;

/// Router for everything under `/api`.
pub fn router() -> Router {
    Router::new()
        .route("/stats", get(system::stats))
        .route("/benchmarks", get(system::benchmarks))
        .route("/registry/events", get(events::registry_events))
        .nest("/projects", projects::router())
        .nest("/verifications", projects::verification_router())
        .merge(marketplace::router())
        .nest("/companies", companies::router())
}
