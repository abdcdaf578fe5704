//! havn server entry point.
//!
//! Boots the offline layer against the configured origin and exposes it as an
//! MCP server on stdio. Logging goes to stderr to avoid interfering with the
//! JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

use havn_client::{FetchClient, FetchConfig, LayerContext, LifecycleController, Manifest, Registration};
use havn_core::{AppConfig, CacheDb, SharedStore};

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.version, origin = %config.origin, db = %config.db_path.display(), "starting havn on stdio transport");

    let store: SharedStore = Arc::new(CacheDb::open(&config.db_path).await?);
    let transport = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let context = LayerContext::from_config(&config, store.clone(), transport.clone())?;
    let registration = Arc::new(Registration::new(store, transport));

    let controller = LifecycleController::new(config.version.clone(), Manifest::from_config(&config)?, &context);
    if let Err(e) = registration.register(controller).await {
        tracing::error!(version = %config.version, error = %e, "initial install failed; requests pass through");
    }

    registration.open_session();

    let handler = handler::HavnServer::new(registration.clone(), context, config);
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    if let Some(version) = registration.close_session().await? {
        tracing::info!(%version, "waiting version took over on shutdown");
    }

    Ok(())
}
