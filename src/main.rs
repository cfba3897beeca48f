//! porch server binary.
//!
//! `porch serve` runs the HTTP gateway; `porch deploy-schema` creates
//! the database schema and exits. Both read their configuration from
//! the environment, optionally via a `.env` file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use porch::config::Config;
use porch::http::{self, AppState};
use porch::logging;
use porch::store::Store;

#[derive(Parser)]
#[command(
    name = "porch",
    about = "Coordination service for distributed pipeline workers"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway.
    Serve,
    /// Create the database schema and tables, then exit.
    DeploySchema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::DeploySchema => deploy_schema(config).await,
    }
}

/// Run the gateway until the process is stopped.
async fn serve(config: Config) -> anyhow::Result<()> {
    // Keep the guard alive for the lifetime of the server so file logs
    // are flushed on shutdown.
    let _guard = logging::init(config.logs_dir.as_deref())?;

    let store = Store::connect(&config.db_url, &config.db_schema).await?;
    let app = http::router(AppState::new(store));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, schema = %config.db_schema, "porch listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// Create the schema and tables, idempotently.
async fn deploy_schema(config: Config) -> anyhow::Result<()> {
    let _guard = logging::init(None)?;

    let store = Store::connect(&config.db_url, &config.db_schema).await?;
    store.deploy_schema().await?;
    info!(schema = %config.db_schema, "schema deployed");
    Ok(())
}
