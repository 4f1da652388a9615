use std::sync::Arc;

use anyhow::Context;

use shor_api::app::{build_app, AppServices};
use shor_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shor_observability::init();

    let config = AppConfig::from_env().context("loading configuration")?;
    tracing::info!(?config, "starting");

    let services = Arc::new(AppServices::from_config(&config).await?);
    let app = build_app(services);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
