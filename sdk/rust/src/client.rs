use std::collections::BTreeMap;
use std::fmt;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One route as listed by the panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSummary {
    pub pattern: String,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub handler_name: String,
    pub http_methods: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<Value>,
    #[serde(default)]
    pub schema: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryStats {
    pub total_count: usize,
    pub named_count: usize,
    pub namespace_count: usize,
    pub namespaces: Vec<String>,
}

/// A probe to run through the panel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub url: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// One of none, session, session_cookie_value, basic, bearer, token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ExecuteRequest {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    pub is_json: bool,
    pub elapsed_ms: u64,
    pub final_url: String,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub csrf: Option<Value>,
}

/// Error body returned by the admin API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub kind: String,
}

#[derive(Debug)]
pub enum SdkError {
    Http(reqwest::Error),
    Api { status: u16, error: ApiError },
    Decode(serde_json::Error),
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdkError::Http(e) => write!(f, "request failed: {e}"),
            SdkError::Api { status, error } => {
                write!(f, "panel returned {status} ({}): {}", error.kind, error.error)
            }
            SdkError::Decode(e) => write!(f, "unexpected response body: {e}"),
        }
    }
}

impl std::error::Error for SdkError {}

impl From<reqwest::Error> for SdkError {
    fn from(e: reqwest::Error) -> Self {
        SdkError::Http(e)
    }
}

impl SdkError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            SdkError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `kind` of an API error.
    pub fn kind(&self) -> Option<&str> {
        match self {
            SdkError::Api { error, .. } => Some(&error.kind),
            _ => None,
        }
    }
}

pub struct PanelClient {
    client: Client,
    panel_url: String,
    api_key: String,
}

impl PanelClient {
    pub fn new(panel_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            panel_url: panel_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.panel_url, path))
            .bearer_auth(&self.api_key)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.panel_url, path))
            .bearer_auth(&self.api_key)
    }

    pub async fn status(&self) -> Result<Value, SdkError> {
        decode(self.get("/admin/status").send().await?).await
    }

    /// List routes, optionally filtered by a search query.
    pub async fn list_routes(&self, query: Option<&str>) -> Result<Vec<RouteSummary>, SdkError> {
        let mut request = self.get("/admin/urls");
        if let Some(q) = query {
            request = request.query(&[("q", q)]);
        }
        decode(request.send().await?).await
    }

    pub async fn grouped(&self) -> Result<BTreeMap<String, Vec<RouteSummary>>, SdkError> {
        decode(self.get("/admin/urls/grouped").send().await?).await
    }

    pub async fn stats(&self) -> Result<InventoryStats, SdkError> {
        decode(self.get("/admin/urls/stats").send().await?).await
    }

    pub async fn detail(&self, pattern: &str) -> Result<Value, SdkError> {
        let request = self.get("/admin/urls/detail").query(&[("pattern", pattern)]);
        decode(request.send().await?).await
    }

    /// Run a probe. `session_cookie` is forwarded as the caller's own session.
    pub async fn execute(
        &self,
        req: &ExecuteRequest,
        session_cookie: Option<&str>,
    ) -> Result<ExecuteResponse, SdkError> {
        let mut request = self.post("/admin/urls/execute").json(req);
        if let Some(cookie) = session_cookie {
            request = request.header(reqwest::header::COOKIE, cookie);
        }
        decode(request.send().await?).await
    }

    pub async fn curl(&self, req: &ExecuteRequest) -> Result<String, SdkError> {
        let value: Value = decode(self.post("/admin/urls/curl").json(req).send().await?).await?;
        Ok(value["command"].as_str().unwrap_or_default().to_string())
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, SdkError> {
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        let error = serde_json::from_str::<ApiError>(&text).unwrap_or(ApiError {
            error: text,
            kind: "unknown".to_string(),
        });
        return Err(SdkError::Api {
            status: status.as_u16(),
            error,
        });
    }

    serde_json::from_str(&text).map_err(SdkError::Decode)
}
