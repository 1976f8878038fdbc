//! HTTP surface: router construction and the serve loop.

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::handlers;
use crate::metrics::RelayMetrics;
use crate::ws::Registry;

#[derive(Clone)]
pub struct RelayState {
    pub registry: Arc<Registry>,
    pub metrics: Arc<RelayMetrics>,
    pub config: Arc<RelayConfig>,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            metrics: Arc::new(RelayMetrics::new()),
            config: Arc::new(config),
        }
    }
}

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

/// Build the relay router. When `static_dir` is set, every unmatched path is
/// served from it (the browser chat UI).
pub fn build_router(state: RelayState, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .route("/ws", get(handlers::relay_websocket_handler))
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler));

    if let Some(dir) = static_dir {
        info!("Serving static assets from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}
