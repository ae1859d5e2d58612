//! Operator-supplied probe requests.

use std::collections::BTreeMap;

use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::inventory::introspect::CANONICAL_METHODS;
use crate::probe::auth::AuthMode;
use crate::probe::error::ProbeError;

/// A test request as submitted by an operator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    /// Raw body text. JSON values other than strings are accepted and
    /// re-serialized.
    #[serde(deserialize_with = "body_as_text")]
    pub body: Option<String>,
    pub auth_mode: AuthMode,
    pub auth_value: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Default for ProbeRequest {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            body: None,
            auth_mode: AuthMode::None,
            auth_value: None,
            timeout_secs: None,
        }
    }
}

fn body_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

/// Verbs whose requests carry a body.
pub fn carries_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Verbs that change server state and need a CSRF token.
pub fn is_mutating(method: &Method) -> bool {
    carries_body(method) || *method == Method::DELETE
}

impl ProbeRequest {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn auth(mut self, mode: AuthMode, value: Option<&str>) -> Self {
        self.auth_mode = mode;
        self.auth_value = value.map(str::to_string);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// The request verb; an empty method means GET.
    pub fn verb(&self) -> Result<Method, ProbeError> {
        let upper = self.method.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return Ok(Method::GET);
        }
        if !CANONICAL_METHODS.contains(&upper.as_str()) {
            return Err(ProbeError::UnsupportedMethod(self.method.clone()));
        }
        Method::from_bytes(upper.as_bytes())
            .map_err(|_| ProbeError::UnsupportedMethod(self.method.clone()))
    }

    /// Body text to send, if the verb carries one and it is not blank.
    pub fn outgoing_body(&self, method: &Method) -> Option<&str> {
        self.body
            .as_deref()
            .filter(|body| carries_body(method) && !body.trim().is_empty())
    }
}
