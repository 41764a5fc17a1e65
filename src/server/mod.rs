// HTTP serving front
// Exposes single-model and parallel inference over axum

mod handlers;

pub use handlers::{create_router, health_check, metrics_endpoint, AppError};

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::metrics::ServingMetrics;
use crate::models::ModelRegistry;
use crate::router::ParallelRouter;

/// Shared state behind every request
pub struct ModelServingServer {
    /// Loaded models by name
    registry: Arc<ModelRegistry>,
    /// Champion/challenger fan-out
    router: Arc<ParallelRouter>,
    /// Prometheus metrics
    metrics: Arc<ServingMetrics>,
    /// Server configuration
    config: ServerConfig,
    started_at: Instant,
}

impl ModelServingServer {
    pub fn new(
        config: ServerConfig,
        registry: ModelRegistry,
        router: ParallelRouter,
        metrics: Arc<ServingMetrics>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            router: Arc::new(router),
            metrics,
            config,
            started_at: Instant::now(),
        }
    }

    /// Build the axum application with tracing (and CORS when enabled)
    pub fn app(self) -> axum::Router {
        let cors_enabled = self.config.cors_enabled;
        let app = create_router(Arc::new(self)).layer(TraceLayer::new_for_http());
        if cors_enabled {
            app.layer(CorsLayer::permissive())
        } else {
            app
        }
    }

    /// Start the HTTP server; returns after ctrl-c
    pub async fn serve(self) -> Result<()> {
        let addr: SocketAddr = self.config.bind_address.parse()?;
        let models = self.registry.len();
        let app = self.app();

        tracing::info!(%addr, models, "Starting model server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Model server stopped");
        Ok(())
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<ParallelRouter> {
        &self.router
    }

    pub fn metrics(&self) -> &Arc<ServingMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
