use std::sync::Arc;

use anyhow::Context;

use wattcast_infra::ServiceConfig;

/// Listen address override.
const ADDR_ENV: &str = "WATTCAST_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wattcast_observability::init();

    let config = ServiceConfig::from_env().context("loading configuration")?;
    let services = Arc::new(wattcast_api::app::build_services(config).context("wiring services")?);
    let app = wattcast_api::app::build_app(Arc::clone(&services));

    let addr = std::env::var(ADDR_ENV).unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    services.shutdown().context("flushing model registry")?;
    Ok(())
}
