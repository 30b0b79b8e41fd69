//! mcp-relay server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;

use relay_client::{UnlockerClient, UnlockerConfig};
use relay_core::{AppConfig, AuditLog};

mod context;
mod handler;
mod logging;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;

    let audit = match &config.debug_log_file {
        Some(path) => AuditLog::to_file(path, config.debug_log_max_bytes()),
        None => AuditLog::disabled(),
    };
    logging::init(&audit);
    if let Some(path) = &config.debug_log_file {
        tracing::info!(path = %path.display(), "writing audit log");
    }

    let fetcher = UnlockerClient::new(UnlockerConfig::from_app_config(&config)?, audit.clone())?;
    let sweep_interval = config.cache_sweep_interval();
    let ctx = Arc::new(context::AppContext::new(config, Arc::new(fetcher), audit)?);
    let _sweeper = ctx.cache.spawn_sweeper(sweep_interval);

    tracing::info!(
        zone = %ctx.config.unlocker_zone,
        cache_ttl_ms = ctx.config.page_cache_ttl_ms,
        max_cache_size = ctx.config.max_cache_size,
        rate_limit = ctx.config.rate_limit.as_deref().unwrap_or("none"),
        "Starting mcp-relay server on stdio transport"
    );

    let handler = handler::RelayServer::new(ctx);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
