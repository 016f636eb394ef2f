use anyhow::Context;

use carbonsense_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    carbonsense_observability::init(config.log_format);

    let bind_addr = config.bind_addr.clone();
    let app = carbonsense_api::app::build_app(config).context("failed to open data stores")?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
