//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the panel.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the URLs panel.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PanelConfig {
    /// Listener configuration (bind address, request limits).
    pub listener: ListenerConfig,

    /// Admin API access.
    pub admin: AdminConfig,

    /// Live request testing policy.
    pub testing: TestingConfig,

    /// Route inventory settings.
    pub inventory: InventoryConfig,

    /// Outbound probe settings.
    pub probe: ProbeConfig,

    /// Route documents available for inspection.
    pub sources: Vec<RouteSourceConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8090").
    pub bind_address: String,

    /// Total time allowed for one admin request, in seconds.
    /// Must exceed `probe.max_timeout_secs`.
    pub request_timeout_secs: u64,

    /// Maximum admin request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8090".to_string(),
            request_timeout_secs: 150,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Base URL used to build test URLs in the detail view.
    ///
    /// Without it the admin request's Host header is used, with the scheme
    /// taken from `X-Forwarded-Proto` and `http` otherwise. Set this when a
    /// TLS-terminating proxy in front of the panel does not send that header.
    pub public_base_url: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            public_base_url: None,
        }
    }
}

/// Live request testing policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TestingConfig {
    /// Allow operators to fire test requests.
    pub enable_testing: bool,

    /// Exact hostnames that may be probed. When set, replaces the
    /// private-network denylist entirely.
    pub allowed_hosts: Option<Vec<String>>,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            enable_testing: true,
            allowed_hosts: None,
        }
    }
}

/// Route inventory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Regexes matched against patterns without their leading slash.
    pub exclude_url_patterns: Vec<String>,

    /// Name of the route source to inspect.
    pub route_source: String,

    /// Maximum group nesting walked by the collector.
    pub max_depth: usize,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            exclude_url_patterns: Vec::new(),
            route_source: "primary".to_string(),
            max_depth: 64,
        }
    }
}

/// Outbound probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Timeout used when the operator does not pick one.
    pub default_timeout_secs: u64,

    /// Upper bound for operator-selected timeouts.
    pub max_timeout_secs: u64,

    /// Response bodies are truncated beyond this size.
    pub max_response_bytes: usize,

    /// User agent for outbound probes.
    pub user_agent: String,

    /// Cookie carrying the session id on the target service.
    pub session_cookie_name: String,

    /// Cookie carrying the CSRF token on the target service.
    pub csrf_cookie_name: String,

    /// Header the target service reads the CSRF token from.
    pub csrf_header_name: String,

    /// Budget for the GET that harvests a CSRF token, independent of the
    /// probe timeout.
    pub csrf_preflight_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
            max_timeout_secs: 120,
            max_response_bytes: 5 * 1024 * 1024,
            user_agent: concat!("urls-panel/", env!("CARGO_PKG_VERSION")).to_string(),
            session_cookie_name: "sessionid".to_string(),
            csrf_cookie_name: "csrftoken".to_string(),
            csrf_header_name: "X-CSRFToken".to_string(),
            csrf_preflight_timeout_ms: 5_000,
        }
    }
}

/// A route document registered under a name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteSourceConfig {
    /// Identifier referenced by `inventory.route_source`.
    pub name: String,

    /// Path to a TOML or JSON route document.
    pub path: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
