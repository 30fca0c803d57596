use std::sync::Arc;

use anyhow::Result;
use axum::{Router, serve};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use rmcp::{
    ServiceExt,
    transport::{
        StreamableHttpServerConfig, StreamableHttpService, stdio,
        streamable_http_server::session::local::LocalSessionManager,
    },
};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod mcp;
use mcp::{
    TableauMCPFactory,
    http::{RestClient, TableauConfig},
    tableau::TableauApi,
};

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";
const TEST_SAMPLE_WORKBOOKS: usize = 3;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

/// Tableau MCP Server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Test authentication only
    #[arg(long)]
    test: bool,

    /// How MCP clients connect
    #[arg(long, value_enum, default_value = "stdio", env = "TABLEAU_MCP_TRANSPORT")]
    transport: Transport,

    /// Listen address for the HTTP transport
    #[arg(long, default_value = DEFAULT_BIND_ADDRESS, env = "TABLEAU_MCP_BIND")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load variables from .env file if it exists into the environment
    dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing. Stdout belongs to the stdio transport, so logs go to stderr.
    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let api: Arc<dyn TableauApi> = Arc::new(RestClient::new(TableauConfig::from_env()?)?);

    if cli.test {
        return test_authentication(api.as_ref()).await;
    }

    match cli.transport {
        Transport::Stdio => serve_stdio(api.clone()).await?,
        Transport::Http => serve_http(api.clone(), &cli.bind).await?,
    }

    if let Err(e) = api.sign_out().await {
        warn!(error = %e, "sign-out failed");
    }
    Ok(())
}

async fn test_authentication(api: &dyn TableauApi) -> Result<()> {
    if let Err(e) = api.ensure_authenticated().await {
        println!("❌ Authentication failed!");
        return Err(e.into());
    }
    println!("✅ Authentication successful!");

    let workbooks = api.workbooks().await?;
    println!("📊 Found {} workbooks", workbooks.len());
    for workbook in workbooks.iter().take(TEST_SAMPLE_WORKBOOKS) {
        println!("  - {}", workbook.name);
    }

    api.sign_out().await?;
    Ok(())
}

async fn serve_stdio(api: Arc<dyn TableauApi>) -> Result<()> {
    info!("Starting Tableau MCP server on stdio");
    let service = TableauMCPFactory::new(api)
        .serve(stdio())
        .await
        .inspect_err(|error| tracing::error!("serving error: {:?}", error))?;
    service.waiting().await?;
    Ok(())
}

async fn serve_http(api: Arc<dyn TableauApi>, bind: &str) -> Result<()> {
    // Setting up the Streamable HTTP Service; every MCP session shares the one Tableau session
    info!("Setting up the Streamable HTTP Service");
    let service = StreamableHttpService::new(
        move || Ok(TableauMCPFactory::new(api.clone())),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    // Starting the server... Setting up the router and TCP listener
    info!("Starting server on {}", bind);
    let router = Router::new().nest_service("/mcp", service);
    let tcp_listener = TcpListener::bind(bind).await?;

    // Graceful shutdown on CTRL+C
    let shutdown = async {
        signal::ctrl_c().await.unwrap_or_else(|e| {
            eprintln!("failed to install CTRL+C handler: {e}");
        });
    };

    serve(tcp_listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
