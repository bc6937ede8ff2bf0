use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wealth_workflow_orchestrator::{agent::Orchestrator, api::start_server, config::EngineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env()?;
    let api_port = config.api_port;

    info!("Wealth Workflow Orchestrator - API Server");
    info!(
        port = api_port,
        remote_handlers = config.financial_api_base_url.is_some(),
        enforce_timeouts = config.enforce_timeouts,
        "Configuration loaded"
    );

    // Create orchestrator
    let orchestrator = Arc::new(
        Orchestrator::builder(config)
            .with_builtin_workflows()?
            .build()?,
    );

    info!("Starting API server...");

    // Start API server
    start_server(orchestrator, api_port).await?;

    Ok(())
}
