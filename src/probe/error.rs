//! Probe failure taxonomy.

use thiserror::Error;

use crate::probe::auth::AuthMode;

/// Why a probe was not executed, or did not complete.
///
/// Every variant maps to one HTTP status for the admin API; none of them is a
/// catch-all for input problems.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("URL testing is disabled")]
    Disabled,

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("requests to '{host}' are blocked ({reason})")]
    HostBlocked { host: String, reason: &'static str },

    #[error("host '{host}' is not in allowed_hosts")]
    HostNotAllowed { host: String },

    #[error("unsupported HTTP method '{0}'")]
    UnsupportedMethod(String),

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("auth mode '{0}' requires an auth value")]
    MissingAuthValue(AuthMode),

    #[error("malformed request body: {0}")]
    MalformedRequestBody(String),

    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("could not connect to {url}: {message}")]
    ConnectionError { url: String, message: String },

    #[error("request failed: {0}")]
    OtherTransportError(String),
}

impl ProbeError {
    /// Stable identifier for clients and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Disabled => "disabled",
            ProbeError::InvalidUrl { .. } => "invalid_url",
            ProbeError::HostBlocked { .. } => "host_blocked",
            ProbeError::HostNotAllowed { .. } => "host_not_allowed",
            ProbeError::UnsupportedMethod(_) => "unsupported_method",
            ProbeError::InvalidHeader { .. } => "invalid_header",
            ProbeError::MissingAuthValue(_) => "missing_auth_value",
            ProbeError::MalformedRequestBody(_) => "malformed_request_body",
            ProbeError::Timeout { .. } => "timeout",
            ProbeError::ConnectionError { .. } => "connection_error",
            ProbeError::OtherTransportError(_) => "transport_error",
        }
    }

    /// HTTP status reported to the caller of the admin API.
    pub fn status_code(&self) -> u16 {
        match self {
            ProbeError::InvalidUrl { .. }
            | ProbeError::UnsupportedMethod(_)
            | ProbeError::InvalidHeader { .. }
            | ProbeError::MissingAuthValue(_)
            | ProbeError::MalformedRequestBody(_) => 400,
            ProbeError::Disabled
            | ProbeError::HostBlocked { .. }
            | ProbeError::HostNotAllowed { .. } => 403,
            ProbeError::Timeout { .. } => 408,
            ProbeError::ConnectionError { .. } => 502,
            ProbeError::OtherTransportError(_) => 500,
        }
    }
}
