use anyhow::Context;

use stockroom_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockroom_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let bind_address = config.bind_address;
    tracing::info!(
        default_tenant_id = %config.default_tenant_id,
        persistent = config.database_url.is_some(),
        "starting stockroom api"
    );

    let app = stockroom_api::app::build_app(config)
        .await
        .context("failed to build application")?;

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
