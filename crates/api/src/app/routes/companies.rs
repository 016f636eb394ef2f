//! Company registration, emission ledgers and compliance assessment.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};

use carbonsense_compliance::{AssessmentPeriod, CompanyProfile};
use carbonsense_core::{CompanyId, EntryId};
use carbonsense_infra::{DirectoryError, NewCompany};

use crate::app::{dto, errors, services::{self, AppServices}};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_company).get(list_companies))
        .route("/:id/summary", get(carbon_summary))
        .route("/:id/dashboard", get(company_dashboard))
        .route("/:id/emissions", get(list_emissions).post(add_emissions))
        .route("/:id/emissions/:entry_id", delete(remove_emission))
        .route("/:id/assessment", post(assess_company))
}

fn parse_company(id: &str) -> Result<CompanyId, axum::response::Response> {
    id.parse::<CompanyId>().map_err(|_| errors::invalid_id("company id"))
}

pub async fn register_company(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewCompany>,
) -> axum::response::Response {
    let registered = services::blocking(
        &services,
        move |s| s.companies.register(body),
        errors::directory_error_to_response,
    )
    .await;
    match registered {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(resp) => resp,
    }
}

pub async fn list_companies(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.companies.all() {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::directory_error_to_response(e),
    }
}

pub async fn carbon_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let company = match parse_company(&id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let summary = services::blocking(
        &services,
        move |s| s.companies.carbon_summary(&company),
        errors::directory_error_to_response,
    )
    .await;
    match summary {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(resp) => resp,
    }
}

/// Registry view keyed by the company's registry address.
pub async fn company_dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let company = match parse_company(&id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match services.registry.read(|r| r.dashboard(&company)) {
        Ok(dashboard) => (StatusCode::OK, Json(dashboard)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_emissions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let company = match parse_company(&id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let ledger = match services::blocking(
        &services,
        move |s| s.companies.load_ledger(&company),
        errors::directory_error_to_response,
    )
    .await
    {
        Ok(l) => l,
        Err(resp) => return resp,
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "items": ledger.entries(),
            "total_kg": ledger.total_kg(),
            "total_tonnes": ledger.total_tonnes(),
            "scope_totals": ledger.scope_totals(),
            "totals_by_category": ledger.totals_by_category(),
            "totals_by_business_unit": ledger.totals_by_business_unit(),
            "verified_share": ledger.verified_share(),
        })),
    )
        .into_response()
}

pub async fn add_emissions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::EmissionsUpload>,
) -> axum::response::Response {
    let company = match parse_company(&id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let imported = services::blocking(
        &services,
        move |s| s.companies.import_emissions(&company, body.into_rows()),
        errors::directory_error_to_response,
    )
    .await;
    match imported {
        Ok(items) => (StatusCode::CREATED, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(resp) => resp,
    }
}

pub async fn remove_emission(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, entry_id)): Path<(String, String)>,
) -> axum::response::Response {
    let company = match parse_company(&id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Ok(entry_id) = entry_id.parse::<EntryId>() else {
        return errors::invalid_id("entry id");
    };
    let removed = services::blocking(
        &services,
        move |s| s.companies.remove_emission(&company, entry_id),
        errors::directory_error_to_response,
    )
    .await;
    match removed {
        Ok(removed) => (StatusCode::OK, Json(serde_json::json!({ "removed": removed }))).into_response(),
        Err(resp) => resp,
    }
}

pub async fn assess_company(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssessmentRequest>,
) -> axum::response::Response {
    let company = match parse_company(&id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let lookup = company.clone();
    let loaded = services::blocking(
        &services,
        move |s| {
            let record = s
                .companies
                .get(&lookup)?
                .ok_or_else(|| DirectoryError::NotFound(lookup.clone()))?;
            let ledger = s.companies.load_ledger(&lookup)?;
            Ok::<_, DirectoryError>((record, ledger))
        },
        errors::directory_error_to_response,
    )
    .await;
    let (record, ledger) = match loaded {
        Ok(loaded) => loaded,
        Err(resp) => return resp,
    };
    let period = match AssessmentPeriod::months(body.period_months) {
        Ok(p) => p,
        Err(e) => return errors::compliance_error_to_response(e),
    };

    let profile = CompanyProfile {
        name: record.company_name,
        industry: body.industry.unwrap_or(record.industry),
        employees: body.employees,
        revenue_million: body.revenue_million,
        country: body.country.unwrap_or(record.location),
    };

    let assessed = if body.fallback_to_default {
        services.assessor.assess_or_default(&ledger, &profile, period)
    } else {
        services.assessor.assess(&ledger, &profile, period)
    };
    let result = match assessed {
        Ok(r) => r,
        Err(e) => return errors::compliance_error_to_response(e),
    };

    let scenarios = dto::REDUCTION_SCENARIOS
        .iter()
        .map(|pct| result.reduction_savings(*pct))
        .collect::<Result<Vec<_>, _>>();
    let reduction_scenarios = match scenarios {
        Ok(s) => s,
        Err(e) => return errors::compliance_error_to_response(e),
    };

    tracing::info!(
        company_id = %company,
        industry = %result.industry,
        status = result.status.as_str(),
        ratio = result.performance_ratio,
        "compliance assessed"
    );

    (
        StatusCode::OK,
        Json(dto::AssessmentResponse {
            result,
            reduction_scenarios,
        }),
    )
        .into_response()
}
