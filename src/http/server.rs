//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the admin API
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Bind server to listener
//! - Stop accepting on shutdown and drain in-flight requests

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admin::setup_admin_router;
use crate::config::PanelConfig;
use crate::http::request::{RequestIdExt, UuidRequestId};
use crate::inventory::{ExclusionError, RouteExclusions, RouteSource, RouteSources, SourceError};
use crate::probe::{ProbeError, SafeRequestProxy};

/// Errors raised while assembling the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Exclusions(#[from] ExclusionError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("failed to initialize probe client: {0}")]
    Probe(#[from] ProbeError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PanelConfig>,
    pub source: Arc<dyn RouteSource>,
    pub exclusions: RouteExclusions,
    pub proxy: Arc<SafeRequestProxy>,
}

impl AppState {
    /// Resolve the configured route source and compile the exclusions.
    pub fn new(config: PanelConfig, sources: &RouteSources) -> Result<Self, ServerError> {
        let source = sources.get(&config.inventory.route_source)?;
        let exclusions = RouteExclusions::compile(&config.inventory.exclude_url_patterns)?;
        let proxy = SafeRequestProxy::from_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            source,
            exclusions,
            proxy: Arc::new(proxy),
        })
    }
}

/// HTTP server for the admin API.
pub struct HttpServer {
    router: Router,
    config: Arc<PanelConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: PanelConfig, sources: &RouteSources) -> Result<Self, ServerError> {
        let state = AppState::new(config, sources)?;
        let config = state.config.clone();
        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &PanelConfig, state: AppState) -> Router {
        setup_admin_router(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "admin_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = request.headers().request_id().unwrap_or("unknown")
                    )
                }),
            )
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The router, for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until a shutdown signal is broadcast.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            enable_testing = self.config.testing.enable_testing,
            route_source = %self.config.inventory.route_source,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &PanelConfig {
        &self.config
    }
}
