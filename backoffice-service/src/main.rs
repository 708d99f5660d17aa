use backoffice_service::{config::Config, services, Application};
use service_core::observability::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    init_tracing(
        "backoffice-service",
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    );

    services::init_metrics();

    tracing::info!(
        port = config.common.port,
        "Starting backoffice-service"
    );

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
