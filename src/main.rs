//! KumaView server binary.

use kumaview::config::ServerConfig;
use kumaview::service::StatusService;
use kumaview::web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("kumaview=info".parse()?))
        .init();

    // Load configuration
    let cfg = match ServerConfig::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Starting KumaView on port {}...", cfg.http_port);
    tracing::info!("Upstream status page: {}", cfg.html_endpoint());
    if cfg.dev_mode {
        tracing::warn!("Development mode enabled");
    }

    // Build the upstream client
    let service = Arc::new(StatusService::new(cfg)?);

    // Start web server
    let server = Server::new(service);
    server.start().await?;

    Ok(())
}
