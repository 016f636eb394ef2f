//! Service wiring: event log, registry, company directory and assessor.

use std::sync::Arc;

use anyhow::Context;
use axum::http::StatusCode;
use axum::response::Response;

use carbonsense_compliance::{BenchmarkTable, ComplianceAssessor};
use carbonsense_infra::event_store::FileEventStore;
use carbonsense_infra::{AppConfig, CompanyDirectory, RegistryService};

use crate::app::errors;

pub type Registry = RegistryService<FileEventStore>;

/// Process-wide services shared by all handlers.
#[derive(Debug)]
pub struct AppServices {
    pub registry: Registry,
    pub companies: CompanyDirectory,
    pub assessor: ComplianceAssessor,
    pub config: AppConfig,
}

pub fn build_services(config: AppConfig) -> anyhow::Result<AppServices> {
    let store = FileEventStore::open(&config.event_log)
        .with_context(|| format!("failed to open event log {}", config.event_log.display()))?;
    let registry = RegistryService::open(store)
        .context("failed to replay registry log")?
        .with_default_price(config.rates.default_credit_price);

    let companies = CompanyDirectory::open(&config.data_dir)
        .with_context(|| format!("failed to open company data in {}", config.data_dir.display()))?;

    let assessor =
        ComplianceAssessor::new(BenchmarkTable::standard()).with_rates(config.rates.assessment_rates());

    if config.blockchain.blockchain_enabled {
        tracing::warn!(
            network = %config.blockchain.network,
            rpc_url = %config.blockchain.rpc_url,
            "external chain is enabled in config but no adapter is available; using the local registry log"
        );
    }

    tracing::info!(
        event_log = %config.event_log.display(),
        data_dir = %config.data_dir.display(),
        "services ready"
    );

    Ok(AppServices {
        registry,
        companies,
        assessor,
        config,
    })
}

/// Run a service call on the blocking pool.
///
/// Registry appends fsync while holding the registry lock and company
/// writes go through `std::fs`; neither may run on an async worker.
pub async fn blocking<T, E, F>(
    services: &Arc<AppServices>,
    call: F,
    on_error: fn(E) -> Response,
) -> Result<T, Response>
where
    F: FnOnce(&AppServices) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let services = Arc::clone(services);
    match tokio::task::spawn_blocking(move || call(&services)).await {
        Ok(result) => result.map_err(on_error),
        Err(join) => {
            tracing::error!(error = %join, "blocking service call failed");
            Err(errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "service call did not complete",
            ))
        }
    }
}
