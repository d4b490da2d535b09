//! athena-mcp - MCP server for read-only Amazon Athena queries.

use anyhow::Context;
use athena_mcp::athena::{AthenaClient, AthenaClientConfig, QueryExecutionClient};
use athena_mcp::cli::Cli;
use athena_mcp::config::{Config, CredentialSource, ServerSettings};
use athena_mcp::logging;
use athena_mcp::query::{QueryLifecycleController, ResultPaginator};
use athena_mcp::server::{McpServer, ToolRouter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    match cli.log_file() {
        Some(path) => logging::init_file_logging(&path),
        None => logging::init_stderr_logging(),
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let settings = ServerSettings::resolve(&cli.to_overrides(), &config)
        .context("Invalid server configuration")?;
    match &settings.credential_source {
        CredentialSource::Explicit => info!("Using explicit AWS credentials"),
        CredentialSource::Profile(name) => info!("Using AWS credentials profile '{}'", name),
        CredentialSource::Missing => warn!(
            "No AWS credentials found; Athena calls will fail until credentials are configured"
        ),
    }
    info!(
        "Region {}, workgroup {}, output location {}",
        settings.region, settings.defaults.workgroup, settings.defaults.output_location
    );

    let client = AthenaClient::new(
        AthenaClientConfig::new(&settings.region)
            .with_endpoint(settings.endpoint.clone())
            .with_credentials(settings.credentials.clone()),
    )
    .context("Failed to create Athena client")?;
    let client: Arc<dyn QueryExecutionClient> = Arc::new(client);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            signal_token.cancel();
        }
    });

    let controller = QueryLifecycleController::new(
        client.clone(),
        settings.defaults.clone(),
        settings.polling,
    )
    .with_shutdown(shutdown.clone());
    let router = ToolRouter::new(controller, ResultPaginator::new(client));

    McpServer::new(router, shutdown)
        .run(tokio::io::stdin(), tokio::io::stdout())
        .await?;

    info!("Server stopped");
    Ok(())
}
