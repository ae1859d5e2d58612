//! Normalized probe responses.

use std::collections::BTreeMap;
use std::time::Instant;

use reqwest::header::HeaderMap;
use reqwest::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::probe::auth::CsrfSource;

/// What the operator sees after a probe completes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NormalizedResponse {
    pub status_code: u16,
    pub status_text: String,
    /// Lowercased names; repeated headers are joined with ", ".
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON when `is_json`, otherwise the body as a string.
    pub body: Value,
    pub is_json: bool,
    pub elapsed_ms: u64,
    /// URL after redirects.
    pub final_url: String,
    /// True when the body was cut at the configured size limit.
    #[serde(default)]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf: Option<CsrfSource>,
}

impl NormalizedResponse {
    /// Reads the response body (up to `max_bytes`) and normalizes it.
    pub async fn read(
        mut response: Response,
        started: Instant,
        max_bytes: usize,
        csrf: Option<CsrfSource>,
    ) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let headers = flatten_headers(response.headers());
        let final_url = response.url().to_string();

        let mut bytes = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = response.chunk().await? {
            let room = max_bytes - bytes.len();
            if chunk.len() > room {
                bytes.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (body, is_json) = decode_body(&bytes, truncated);
        Ok(Self {
            status_code: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            is_json,
            elapsed_ms,
            final_url,
            truncated,
            csrf,
        })
    }
}

fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    flat
}

/// A body counts as JSON only when it parses completely.
fn decode_body(bytes: &[u8], truncated: bool) -> (Value, bool) {
    if !truncated && !bytes.is_empty() {
        if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
            return (value, true);
        }
    }
    (Value::String(String::from_utf8_lossy(bytes).into_owned()), false)
}
