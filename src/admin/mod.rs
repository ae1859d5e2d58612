//! Admin API.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <api_key>
//!     → auth.rs (reject with 401 otherwise)
//!     → handlers.rs
//!         inventory views → RouteCollector (fresh per request)
//!         execute         → SafeRequestProxy
//!         curl            → probe::curl
//! ```
//!
//! # Design Decisions
//! - The inventory is rebuilt on every request so file sources show their
//!   current contents
//! - The probe caller context is read from the admin request's own cookies

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/urls", get(list_urls))
        .route("/admin/urls/grouped", get(grouped_urls))
        .route("/admin/urls/stats", get(url_stats))
        .route("/admin/urls/detail", get(url_detail))
        .route("/admin/urls/execute", post(execute_request))
        .route("/admin/urls/curl", post(curl_command))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
