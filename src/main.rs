//! urls-panel
//!
//! Serves a read-only inventory of a service's routes, plus a guarded way
//! to fire test requests at them.
//!
//! # Architecture Overview
//!
//! ```text
//!     Admin Request
//!     ──────────────▶ http server ──▶ admin auth ──▶ handlers
//!                                                      │
//!                      ┌───────────────────────────────┼───────────────────┐
//!                      ▼                               ▼                   ▼
//!              ┌──────────────┐               ┌────────────────┐   ┌─────────────┐
//!              │  inventory   │               │     probe      │   │    curl     │
//!              │ source → walk│               │ policy → auth  │   │  rendering  │
//!              │ → exclusions │               │ → reqwest      │   └─────────────┘
//!              └──────────────┘               └───────┬────────┘
//!                                                     ▼
//!                                               Target service
//!
//!     Cross-cutting: config, observability, lifecycle
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;

use urls_panel::config::{load_config, PanelConfig};
use urls_panel::inventory::{FileRouteSource, RouteSources};
use urls_panel::lifecycle::{wait_for_signal, Shutdown};
use urls_panel::observability::{logging, metrics};
use urls_panel::HttpServer;

/// Config path from the first argument, else `URLS_PANEL_CONFIG`.
fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("URLS_PANEL_CONFIG").map(PathBuf::from))
}

fn register_sources(config: &PanelConfig, base_dir: Option<&std::path::Path>) -> RouteSources {
    let mut sources = RouteSources::new();
    for source in &config.sources {
        let path = match base_dir {
            Some(dir) => dir.join(&source.path),
            None => PathBuf::from(&source.path),
        };
        sources.register(source.name.clone(), Arc::new(FileRouteSource::new(path)));
    }
    sources
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    let config = match &path {
        Some(path) => load_config(path)?,
        None => PanelConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "urls-panel starting");

    tracing::info!(
        config = %path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "defaults".into()),
        bind_address = %config.listener.bind_address,
        enable_testing = config.testing.enable_testing,
        allowlist = config.testing.allowed_hosts.is_some(),
        sources = config.sources.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let base_dir = path.as_deref().and_then(|p| p.parent());
    let sources = register_sources(&config, base_dir);
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, &sources)?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let rx = shutdown.subscribe();
    let signals = shutdown.clone();
    tokio::spawn(async move { wait_for_signal(&signals).await });

    server.run(listener, rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
