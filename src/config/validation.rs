//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile exclusion regexes before they reach the collector
//! - Validate value ranges (timeouts > 0, limits ordered)
//! - Check that the selected route source exists
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PanelConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use regex::Regex;

use crate::config::schema::PanelConfig;
use crate::inventory::document::MAX_DOCUMENT_DEPTH;
use crate::probe::policy::parse_ipv6_entry;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &PanelConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.admin.api_key.is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must not be empty"));
    }

    if let Some(hosts) = &config.testing.allowed_hosts {
        for host in hosts {
            if host.is_empty() || host.contains('/') || host.contains('@') {
                errors.push(ValidationError::new(
                    "testing.allowed_hosts",
                    format!("'{host}' must be a bare hostname"),
                ));
            } else if host.contains(':') && parse_ipv6_entry(host).is_none() {
                // Ports are not part of the match, so this entry could never match.
                errors.push(ValidationError::new(
                    "testing.allowed_hosts",
                    format!("'{host}' must be a hostname or IP address without a port"),
                ));
            } else if host.chars().any(|c| c.is_ascii_uppercase()) && parse_ipv6_entry(host).is_none() {
                // Parsed URL hosts are lowercase, so this entry could never match.
                errors.push(ValidationError::new(
                    "testing.allowed_hosts",
                    format!("'{host}' must be lowercase"),
                ));
            }
        }
    }

    for pattern in &config.inventory.exclude_url_patterns {
        if let Err(e) = Regex::new(pattern) {
            errors.push(ValidationError::new(
                "inventory.exclude_url_patterns",
                format!("invalid regex '{pattern}': {e}"),
            ));
        }
    }

    if config.inventory.max_depth == 0 {
        errors.push(ValidationError::new("inventory.max_depth", "must be greater than 0"));
    } else if config.inventory.max_depth > MAX_DOCUMENT_DEPTH {
        // Route documents cannot nest deeper than this, so a larger cap never applies.
        errors.push(ValidationError::new(
            "inventory.max_depth",
            format!("must not exceed {MAX_DOCUMENT_DEPTH}"),
        ));
    }

    let probe = &config.probe;
    if probe.default_timeout_secs == 0 {
        errors.push(ValidationError::new("probe.default_timeout_secs", "must be greater than 0"));
    }
    if probe.max_timeout_secs < probe.default_timeout_secs {
        errors.push(ValidationError::new(
            "probe.max_timeout_secs",
            "must not be lower than probe.default_timeout_secs",
        ));
    }
    if config.listener.request_timeout_secs <= probe.max_timeout_secs {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must exceed probe.max_timeout_secs",
        ));
    }
    if probe.csrf_preflight_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "probe.csrf_preflight_timeout_ms",
            "must be greater than 0",
        ));
    }
    if probe.max_response_bytes == 0 {
        errors.push(ValidationError::new("probe.max_response_bytes", "must be greater than 0"));
    }
    for (field, value) in [
        ("probe.session_cookie_name", &probe.session_cookie_name),
        ("probe.csrf_cookie_name", &probe.csrf_cookie_name),
        ("probe.csrf_header_name", &probe.csrf_header_name),
    ] {
        if value.is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        }
    }

    let mut names = HashSet::new();
    for source in &config.sources {
        if !names.insert(source.name.as_str()) {
            errors.push(ValidationError::new(
                "sources",
                format!("duplicate source name '{}'", source.name),
            ));
        }
    }
    if !config.sources.is_empty() && !names.contains(config.inventory.route_source.as_str()) {
        errors.push(ValidationError::new(
            "inventory.route_source",
            format!("no source named '{}'", config.inventory.route_source),
        ));
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::new(
            "observability.log_format",
            format!("'{other}' is not one of: pretty, json"),
        )),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
