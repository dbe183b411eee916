use anyhow::Result;
use clap::Parser;
use jambda_client::HttpResourceClient;
use jambda_console::{build_console, execute, load_config, Cli};
use jambda_metrics::TracingService;
use std::sync::Arc;
use tracing::{debug, error};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = TracingService::init(cli.json_logs) {
        eprintln!("Failed to initialize tracing: {e}");
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(endpoint) = cli.endpoint {
        config.api.base_url = endpoint;
    }
    debug!(endpoint = %config.api.endpoint(), "Configuration loaded");

    let client = HttpResourceClient::new(&config.api)?;
    let mut console = build_console(&config, Arc::new(client))?;

    let mut stdout = std::io::stdout();
    if let Err(e) = execute(cli.command, &mut console, &mut stdout).await {
        error!(error = %e, "Command failed");
        return Err(e);
    }

    debug!(
        metrics = %console.coordinator().metrics().get_prometheus_metrics().unwrap_or_default(),
        "Session metrics"
    );
    Ok(())
}
