use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header::HOST, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::response::error_response;
use crate::http::server::AppState;
use crate::inventory::pattern::url_template;
use crate::inventory::{InventoryStats, RouteCollector, RouteDescriptor, RouteInventory, SourceError};
use crate::probe::{to_curl, CallerContext, NormalizedResponse, ProbeError, ProbeRequest};

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Failures of the inventory views.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("no route matches pattern '{0}'")]
    RouteNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            AdminError::Source(_) => (StatusCode::INTERNAL_SERVER_ERROR, "source_error"),
            AdminError::RouteNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AdminError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Admin request failed");
        }
        error_response(status, kind, self.to_string())
    }
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub enable_testing: bool,
    pub route_source: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    pub pattern: String,
}

#[derive(Serialize)]
pub struct RouteDetail {
    pub route: RouteDescriptor,
    pub test_url: String,
    pub base_url: String,
    pub enable_testing: bool,
}

#[derive(Serialize)]
pub struct CurlCommand {
    pub command: String,
}

/// Walks the configured source. File sources do blocking I/O, so this runs
/// on the blocking pool.
async fn load_inventory(state: &AppState) -> Result<Arc<RouteInventory>, AdminError> {
    let collector = RouteCollector::new(
        state.source.clone(),
        state.exclusions.clone(),
        state.config.inventory.max_depth,
    );
    tokio::task::spawn_blocking(move || collector.inventory())
        .await
        .map_err(|e| AdminError::Internal(e.to_string()))?
        .map_err(AdminError::from)
}

fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(public) = &state.config.admin.public_base_url {
        return public.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or(&state.config.listener.bind_address);
    format!("{}://{host}", forwarded_scheme(headers))
}

/// Scheme the client used, as reported by a TLS-terminating proxy.
fn forwarded_scheme(headers: &HeaderMap) -> &'static str {
    let proto = headers
        .get(X_FORWARDED_PROTO)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim);
    match proto {
        Some(p) if p.eq_ignore_ascii_case("https") => "https",
        _ => "http",
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        enable_testing: state.proxy.policy().enabled,
        route_source: state.config.inventory.route_source.clone(),
    })
}

pub async fn list_urls(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<RouteDescriptor>>, AdminError> {
    let inventory = load_inventory(&state).await?;
    let routes = match query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => inventory.search(q),
        None => inventory.routes().to_vec(),
    };
    Ok(Json(routes))
}

pub async fn grouped_urls(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Vec<RouteDescriptor>>>, AdminError> {
    Ok(Json(load_inventory(&state).await?.grouped()))
}

pub async fn url_stats(State(state): State<AppState>) -> Result<Json<InventoryStats>, AdminError> {
    Ok(Json(load_inventory(&state).await?.stats()))
}

pub async fn url_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DetailQuery>,
) -> Result<Json<RouteDetail>, AdminError> {
    let inventory = load_inventory(&state).await?;
    let route = inventory
        .find(&query.pattern)
        .cloned()
        .ok_or_else(|| AdminError::RouteNotFound(query.pattern.clone()))?;

    let base_url = base_url(&state, &headers);
    Ok(Json(RouteDetail {
        test_url: format!("{base_url}{}", url_template(&route.pattern)),
        base_url,
        enable_testing: state.proxy.policy().enabled,
        route,
    }))
}

pub async fn execute_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ProbeRequest>, JsonRejection>,
) -> Result<Json<NormalizedResponse>, ProbeError> {
    if !state.proxy.policy().enabled {
        return Err(ProbeError::Disabled);
    }
    let Json(request) = payload.map_err(|e| ProbeError::MalformedRequestBody(e.body_text()))?;
    let caller = CallerContext::from_headers(&headers, state.proxy.credential_names());
    state.proxy.execute(&request, &caller).await.map(Json)
}

pub async fn curl_command(
    State(state): State<AppState>,
    payload: Result<Json<ProbeRequest>, JsonRejection>,
) -> Result<Json<CurlCommand>, ProbeError> {
    let Json(request) = payload.map_err(|e| ProbeError::MalformedRequestBody(e.body_text()))?;
    Ok(Json(CurlCommand {
        command: to_curl(&request, state.proxy.credential_names()),
    }))
}
