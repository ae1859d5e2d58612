//! URL inventory and safety-gated request testing panel.

pub mod admin;
pub mod config;
pub mod http;
pub mod inventory;
pub mod lifecycle;
pub mod observability;
pub mod probe;

pub use config::schema::PanelConfig;
pub use http::HttpServer;
pub use inventory::{RouteCollector, RouteInventory, RouteSources};
pub use lifecycle::Shutdown;
pub use probe::SafeRequestProxy;
