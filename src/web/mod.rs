//! Web server module.

mod cache;
mod handlers;

pub use cache::ResponseCache;
pub use handlers::*;

use crate::config::ServerConfig;
use crate::model::GlobalConfig;
use crate::service::{MonitoringSnapshot, StatusService};

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<StatusService>,
    pub config_cache: Arc<ResponseCache<Arc<GlobalConfig>>>,
    pub monitoring_cache: Arc<ResponseCache<Arc<MonitoringSnapshot>>>,
    pub started: Instant,
}

impl AppState {
    /// Monitoring snapshot, shared by all viewers within the cache window.
    pub async fn monitoring_snapshot(&self) -> Arc<MonitoringSnapshot> {
        let service = self.service.clone();
        self.monitoring_cache
            .get_or_refresh(|| async move { Arc::new(service.get_monitoring_data().await) })
            .await
    }
}

/// Web server for KumaView.
pub struct Server {
    state: AppState,
    port: u16,
}

impl Server {
    /// Create a new server around the status service.
    pub fn new(service: Arc<StatusService>) -> Self {
        let config: &ServerConfig = service.config();
        let ttl = config.cache_ttl;
        let port = config.http_port;

        Self {
            state: AppState {
                config_cache: Arc::new(ResponseCache::new(ttl)),
                monitoring_cache: Arc::new(ResponseCache::new(ttl)),
                started: Instant::now(),
                service,
            },
            port,
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/api/config", get(handlers::handle_config))
            .route("/api/monitor", get(handlers::handle_monitoring))
            .route("/api/monitor/{id}", get(handlers::handle_monitor))
            .route("/api/health", get(handlers::handle_health))
            .fallback(handlers::handle_not_found)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
