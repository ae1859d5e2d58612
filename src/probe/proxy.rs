//! The safety-gated request executor.

use std::error::Error as StdError;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{redirect, Client};
use url::Url;

use crate::config::schema::{PanelConfig, ProbeConfig};
use crate::observability::metrics;
use crate::probe::auth::{CallerContext, CredentialNames, Credentials};
use crate::probe::error::ProbeError;
use crate::probe::policy::{redact_url, redacted, ProxyPolicy};
use crate::probe::request::ProbeRequest;
use crate::probe::response::NormalizedResponse;

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Executes operator probes under a [`ProxyPolicy`].
#[derive(Debug, Clone)]
pub struct SafeRequestProxy {
    client: Client,
    policy: ProxyPolicy,
    names: CredentialNames,
    max_response_bytes: usize,
}

impl SafeRequestProxy {
    pub fn new(policy: ProxyPolicy, probe: &ProbeConfig) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .user_agent(probe.user_agent.clone())
            .redirect(redirect_policy(policy.clone()))
            // Environment proxies would hide the real destination from the host checks.
            .no_proxy()
            .build()
            .map_err(|e| ProbeError::OtherTransportError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            policy,
            names: CredentialNames::from_config(probe),
            max_response_bytes: probe.max_response_bytes,
        })
    }

    pub fn from_config(config: &PanelConfig) -> Result<Self, ProbeError> {
        Self::new(ProxyPolicy::from_config(config), &config.probe)
    }

    pub fn policy(&self) -> &ProxyPolicy {
        &self.policy
    }

    pub fn credential_names(&self) -> &CredentialNames {
        &self.names
    }

    /// Runs one probe. Nothing touches the network unless testing is enabled
    /// and the destination passes the host checks.
    pub async fn execute(
        &self,
        request: &ProbeRequest,
        caller: &CallerContext,
    ) -> Result<NormalizedResponse, ProbeError> {
        let started = Instant::now();
        let result = self.dispatch(request, caller, started).await;

        // Unknown verbs share one label.
        let method_label = request
            .verb()
            .map(|m| m.to_string())
            .unwrap_or_else(|_| "OTHER".to_string());
        let logged_url = redact_url(&request.url);
        match &result {
            Ok(response) => {
                tracing::info!(
                    method = %method_label,
                    url = %logged_url,
                    status = response.status_code,
                    elapsed_ms = response.elapsed_ms,
                    truncated = response.truncated,
                    "Probe completed"
                );
                metrics::record_probe(&method_label, "success", started.elapsed());
            }
            Err(err) => {
                tracing::warn!(
                    method = %method_label,
                    url = %logged_url,
                    kind = err.kind(),
                    error = %err,
                    "Probe failed"
                );
                metrics::record_probe(&method_label, err.kind(), started.elapsed());
            }
        }
        result
    }

    async fn dispatch(
        &self,
        request: &ProbeRequest,
        caller: &CallerContext,
        started: Instant,
    ) -> Result<NormalizedResponse, ProbeError> {
        if !self.policy.enabled {
            return Err(ProbeError::Disabled);
        }

        let url = self.policy.validate_url(&request.url)?;
        let method = request.verb()?;
        let mut headers = operator_headers(request)?;

        let credentials = Credentials::assemble(
            &self.client,
            &url,
            &method,
            request.auth_mode,
            request.auth_value.as_deref(),
            caller,
            &self.names,
        )
        .await?;
        credentials.merge_into(&mut headers, &url, &self.names)?;

        let body = request.outgoing_body(&method);
        if let Some(body) = body {
            if !headers.contains_key(CONTENT_TYPE)
                && serde_json::from_str::<serde_json::Value>(body).is_ok()
            {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
        }

        let timeout = self.policy.effective_timeout(request.timeout_secs);
        let mut builder = self
            .client
            .request(method, url.clone())
            .headers(headers)
            .timeout(timeout);
        if let Some(body) = body {
            builder = builder.body(body.to_string());
        }
        builder = credentials.authorize(builder);

        tracing::debug!(url = %redacted(&url), timeout_secs = timeout.as_secs(), "Sending probe");
        let response = builder
            .send()
            .await
            .map_err(|e| classify(e, &url, timeout))?;

        NormalizedResponse::read(response, started, self.max_response_bytes, credentials.csrf)
            .await
            .map_err(|e| classify(e, &url, timeout))
    }
}

/// Re-applies the host checks to every redirect target.
fn redirect_policy(policy: ProxyPolicy) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error(ProbeError::OtherTransportError(format!(
                "stopped after {MAX_REDIRECTS} redirects"
            )));
        }
        match policy.check_host(attempt.url()) {
            Ok(()) => attempt.follow(),
            Err(err) => attempt.error(err),
        }
    })
}

fn operator_headers(request: &ProbeRequest) -> Result<HeaderMap, ProbeError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &request.headers {
        let name = name.trim();
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ProbeError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| ProbeError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// Maps a transport failure onto the probe taxonomy.
fn classify(err: reqwest::Error, url: &Url, timeout: Duration) -> ProbeError {
    // The operator URL may carry credentials.
    let err = err.without_url();
    // Redirect policy rejections travel inside the reqwest error.
    if let Some(probe_err) = embedded_probe_error(&err) {
        return probe_err;
    }
    if err.is_timeout() {
        ProbeError::Timeout {
            url: redacted(url),
            timeout_secs: timeout.as_secs(),
        }
    } else if err.is_connect() {
        ProbeError::ConnectionError {
            url: redacted(url),
            message: root_cause(&err),
        }
    } else {
        ProbeError::OtherTransportError(err.to_string())
    }
}

fn embedded_probe_error(err: &reqwest::Error) -> Option<ProbeError> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(probe_err) = e.downcast_ref::<ProbeError>() {
            return Some(probe_err.clone());
        }
        current = e.source();
    }
    None
}

fn root_cause(err: &reqwest::Error) -> String {
    let mut cause: &(dyn StdError + 'static) = err;
    while let Some(next) = cause.source() {
        cause = next;
    }
    cause.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::auth::AuthMode;

    fn proxy(policy: ProxyPolicy) -> SafeRequestProxy {
        SafeRequestProxy::new(policy, &ProbeConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_disabled_wins_over_invalid_input() {
        let policy = ProxyPolicy {
            enabled: false,
            ..Default::default()
        };
        // Even an unparseable URL reports Disabled first.
        let err = proxy(policy)
            .execute(&ProbeRequest::new("GET", "not a url"), &CallerContext::default())
            .await
            .unwrap_err();
        assert_eq!(err, ProbeError::Disabled);
    }

    #[tokio::test]
    async fn test_blocked_before_network() {
        let err = proxy(ProxyPolicy::default())
            .execute(
                &ProbeRequest::new("GET", "http://169.254.169.254/latest/meta-data/"),
                &CallerContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::HostBlocked { .. }));
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_missing_url() {
        let err = proxy(ProxyPolicy::default())
            .execute(&ProbeRequest::default(), &CallerContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::InvalidUrl { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_input_errors() {
        let proxy = proxy(ProxyPolicy::default().with_allowed_hosts(["example.com"]));
        let caller = CallerContext::default();

        let err = proxy
            .execute(&ProbeRequest::new("TRACE", "http://example.com/"), &caller)
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::UnsupportedMethod(_)));

        let err = proxy
            .execute(
                &ProbeRequest::new("GET", "http://example.com/").header("bad header", "x"),
                &caller,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::InvalidHeader { .. }));

        let err = proxy
            .execute(
                &ProbeRequest::new("GET", "http://example.com/").auth(AuthMode::Bearer, None),
                &caller,
            )
            .await
            .unwrap_err();
        assert_eq!(err, ProbeError::MissingAuthValue(AuthMode::Bearer));
    }
}
