use std::sync::Arc;

use anyhow::Context;

use clearway_infra::config::AppConfig;
use clearway_infra::services::ClearwayServices;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clearway_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = ClearwayServices::from_config(&config)
        .await
        .context("failed to start application services")?;

    let app = clearway_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        persistent = config.database_url.is_some(),
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
