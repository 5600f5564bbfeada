//! Sandbox gateway HTTP server - main entry point.
//!
//! Serves:
//! - `/mcp`: MCP streamable HTTP, bearer-authenticated, proxied to the backend
//! - `/.well-known/oauth-*`: OAuth discovery metadata

use clap::Parser;
use sandbox_gateway::auth::metadata;
use sandbox_gateway::router::build_gateway;
use sandbox_gateway::Config;
use tokio::net::TcpListener;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "sandbox-gateway", version, about)]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Base URL of the sandbox backend.
    #[arg(long, env = "GATEWAY_UPSTREAM_URL")]
    upstream_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_env();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(url) = args.upstream_url {
        config.upstream.base_url = url;
    }

    // Initialize observability
    sandbox_gateway::observability::init_tracing(&config.observability);

    // Fail fast on unusable backend URLs
    Url::parse(&config.upstream.mcp_url())?;
    Url::parse(&config.upstream.upload_url())?;

    let http = reqwest::Client::builder()
        .connect_timeout(config.upstream.connect_timeout)
        .build()?;
    let app = build_gateway(&config, http);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Sandbox gateway listening on {}", listener.local_addr()?);
    tracing::info!("  ✓ MCP endpoint: {}", config.server.resource_url());
    tracing::info!("  ✓ Upstream: {}", config.upstream.mcp_url());
    tracing::info!(
        "  ✓ Resource metadata: {}",
        metadata::protected_resource_metadata_url(&config.server)
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Sandbox gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
