//! Credential assembly for probes.
//!
//! # Responsibilities
//! - Map an auth mode plus operator value onto outgoing headers
//! - Reuse the admin caller's session for `session` mode
//! - Attach a CSRF token to state-changing requests, harvesting one from the
//!   target when the caller has none
//!
//! # Design Decisions
//! - A failed CSRF harvest never fails the probe; the outcome is reported
//!   back in the response instead
//! - The harvest uses its own fixed timeout, independent of the probe timeout
//! - Credential cookies are appended to any operator-supplied Cookie header

use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, COOKIE, REFERER, SET_COOKIE};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::schema::ProbeConfig;
use crate::probe::error::ProbeError;
use crate::probe::policy::redacted;
use crate::probe::request::is_mutating;

/// Default timeout for the CSRF pre-flight GET.
pub const CSRF_PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(5);

/// How the probe authenticates against the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    None,
    Session,
    #[serde(alias = "sessionCookieValue")]
    SessionCookieValue,
    Basic,
    Bearer,
    Token,
}

impl AuthMode {
    /// Modes that cannot work without an operator-supplied value.
    pub fn requires_value(self) -> bool {
        matches!(
            self,
            AuthMode::SessionCookieValue | AuthMode::Basic | AuthMode::Bearer | AuthMode::Token
        )
    }

    fn uses_session(self) -> bool {
        matches!(self, AuthMode::Session | AuthMode::SessionCookieValue)
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthMode::None => "none",
            AuthMode::Session => "session",
            AuthMode::SessionCookieValue => "session_cookie_value",
            AuthMode::Basic => "basic",
            AuthMode::Bearer => "bearer",
            AuthMode::Token => "token",
        };
        f.write_str(name)
    }
}

/// Credentials of the authenticated admin caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    pub session_cookie: Option<String>,
    pub csrf_token: Option<String>,
}

impl CallerContext {
    /// Reads the caller's session and CSRF token from admin request headers.
    ///
    /// The CSRF header wins over the CSRF cookie.
    pub fn from_headers(headers: &HeaderMap, names: &CredentialNames) -> Self {
        let session_cookie = request_cookie(headers, &names.session_cookie);
        let csrf_token = headers
            .get(names.csrf_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| request_cookie(headers, &names.csrf_cookie));
        Self {
            session_cookie,
            csrf_token,
        }
    }
}

/// Where the CSRF token attached to a probe came from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CsrfSource {
    Caller,
    Preflight,
    Unavailable { reason: String },
}

/// Cookie and header names used by the target service, plus the budget for
/// harvesting a CSRF token from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialNames {
    pub session_cookie: String,
    pub csrf_cookie: String,
    pub csrf_header: String,
    /// Applies to the pre-flight only, never to the probe itself.
    pub csrf_preflight_timeout: Duration,
}

impl Default for CredentialNames {
    fn default() -> Self {
        Self::from_config(&ProbeConfig::default())
    }
}

impl CredentialNames {
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self {
            session_cookie: config.session_cookie_name.clone(),
            csrf_cookie: config.csrf_cookie_name.clone(),
            csrf_header: config.csrf_header_name.clone(),
            csrf_preflight_timeout: Duration::from_millis(config.csrf_preflight_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Authorization {
    Basic { username: String, password: String },
    Bearer(String),
    Token(String),
}

/// Credentials resolved for a single probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    session: Option<String>,
    csrf_token: Option<String>,
    authorization: Option<Authorization>,
    /// CSRF outcome, set only when a token was needed.
    pub csrf: Option<CsrfSource>,
}

impl Credentials {
    /// Resolves the credentials for `mode`.
    ///
    /// Only session modes may perform network activity (the CSRF pre-flight).
    pub async fn assemble(
        client: &Client,
        url: &Url,
        method: &Method,
        mode: AuthMode,
        value: Option<&str>,
        caller: &CallerContext,
        names: &CredentialNames,
    ) -> Result<Self, ProbeError> {
        let value = value.map(str::trim).filter(|v| !v.is_empty());
        if mode.requires_value() && value.is_none() {
            return Err(ProbeError::MissingAuthValue(mode));
        }

        let mut credentials = Credentials::default();
        match (mode, value) {
            (AuthMode::None, _) => return Ok(credentials),
            (AuthMode::Session, _) => {
                credentials.session = caller.session_cookie.clone();
                if credentials.session.is_none() {
                    tracing::debug!(url = %redacted(url), "Caller has no session cookie to forward");
                }
            }
            (AuthMode::SessionCookieValue, Some(v)) => credentials.session = Some(v.to_string()),
            (AuthMode::Basic, Some(v)) => {
                let (username, password) = v.split_once(':').unwrap_or((v, ""));
                credentials.authorization = Some(Authorization::Basic {
                    username: username.to_string(),
                    password: password.to_string(),
                });
            }
            (AuthMode::Bearer, Some(v)) => {
                credentials.authorization = Some(Authorization::Bearer(v.to_string()))
            }
            (AuthMode::Token, Some(v)) => {
                credentials.authorization = Some(Authorization::Token(v.to_string()))
            }
            (mode, None) => return Err(ProbeError::MissingAuthValue(mode)),
        }

        if mode.uses_session() && is_mutating(method) {
            if let Some(token) = &caller.csrf_token {
                credentials.csrf_token = Some(token.clone());
                credentials.csrf = Some(CsrfSource::Caller);
            } else {
                match harvest_csrf_token(client, url, names, credentials.session.as_deref()).await {
                    Ok(token) => {
                        credentials.csrf_token = Some(token);
                        credentials.csrf = Some(CsrfSource::Preflight);
                    }
                    Err(reason) => {
                        tracing::warn!(url = %redacted(url), reason = %reason, "CSRF token unavailable, sending probe without one");
                        credentials.csrf = Some(CsrfSource::Unavailable { reason });
                    }
                }
            }
        }

        Ok(credentials)
    }

    /// Writes cookie, CSRF and token headers into `headers`.
    pub fn merge_into(
        &self,
        headers: &mut HeaderMap,
        url: &Url,
        names: &CredentialNames,
    ) -> Result<(), ProbeError> {
        let mut cookies = Vec::new();
        if let Some(session) = &self.session {
            cookies.push(format!("{}={}", names.session_cookie, session));
        }
        if let Some(token) = &self.csrf_token {
            cookies.push(format!("{}={}", names.csrf_cookie, token));

            let header = HeaderName::from_bytes(names.csrf_header.as_bytes())
                .map_err(|e| invalid_header(&names.csrf_header, e))?;
            headers.insert(header, header_value(&names.csrf_header, token)?);

            if url.scheme() == "https" && !headers.contains_key(REFERER) {
                headers.insert(REFERER, header_value("Referer", &origin_root(url))?);
            }
        }

        if !cookies.is_empty() {
            let existing = headers
                .get(COOKIE)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.trim().is_empty());
            let joined = match existing {
                Some(existing) => format!("{}; {}", existing, cookies.join("; ")),
                None => cookies.join("; "),
            };
            headers.insert(COOKIE, header_value("Cookie", &joined)?);
        }

        if let Some(Authorization::Token(token)) = &self.authorization {
            headers.insert(AUTHORIZATION, header_value("Authorization", &format!("Token {token}"))?);
        }
        Ok(())
    }

    /// Applies basic or bearer authorization to the outgoing request.
    pub fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.authorization {
            Some(Authorization::Basic { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            Some(Authorization::Bearer(token)) => builder.bearer_auth(token),
            _ => builder,
        }
    }
}

/// GETs the target origin and returns the CSRF cookie it sets.
async fn harvest_csrf_token(
    client: &Client,
    url: &Url,
    names: &CredentialNames,
    session: Option<&str>,
) -> Result<String, String> {
    let mut request = client.get(origin_root(url)).timeout(names.csrf_preflight_timeout);
    if let Some(session) = session {
        request = request.header(COOKIE, format!("{}={}", names.session_cookie, session));
    }
    let response = request
        .send()
        .await
        .map_err(|e| format!("pre-flight request failed: {e}"))?;

    response_cookie(response.headers(), &names.csrf_cookie)
        .ok_or_else(|| format!("pre-flight response did not set '{}'", names.csrf_cookie))
}

fn origin_root(url: &Url) -> String {
    format!("{}/", url.origin().ascii_serialization())
}

/// Finds `name` among the `Set-Cookie` headers of a response.
pub fn response_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Finds `name` among the `Cookie` headers of a request.
pub fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ProbeError> {
    HeaderValue::from_str(value).map_err(|e| invalid_header(name, e))
}

fn invalid_header(name: &str, err: impl fmt::Display) -> ProbeError {
    ProbeError::InvalidHeader {
        name: name.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_missing_auth_value() {
        let client = Client::new();
        for mode in [AuthMode::Basic, AuthMode::Bearer, AuthMode::Token, AuthMode::SessionCookieValue] {
            let err = Credentials::assemble(
                &client,
                &url("https://example.com/"),
                &Method::GET,
                mode,
                Some("  "),
                &CallerContext::default(),
                &CredentialNames::default(),
            )
            .await
            .unwrap_err();
            assert_eq!(err, ProbeError::MissingAuthValue(mode));
        }
    }

    #[tokio::test]
    async fn test_session_uses_caller_csrf_without_preflight() {
        let caller = CallerContext {
            session_cookie: Some("sess".into()),
            csrf_token: Some("tok".into()),
        };
        let names = CredentialNames::default();
        let target = url("https://example.com/api/items/");
        let creds = Credentials::assemble(
            &Client::new(),
            &target,
            &Method::POST,
            AuthMode::Session,
            None,
            &caller,
            &names,
        )
        .await
        .unwrap();
        assert_eq!(creds.csrf, Some(CsrfSource::Caller));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        creds.merge_into(&mut headers, &target, &names).unwrap();
        assert_eq!(headers[COOKIE], "theme=dark; sessionid=sess; csrftoken=tok");
        assert_eq!(headers["x-csrftoken"], "tok");
        assert_eq!(headers[REFERER], "https://example.com/");
    }

    #[tokio::test]
    async fn test_safe_method_needs_no_csrf() {
        let creds = Credentials::assemble(
            &Client::new(),
            &url("http://example.com/"),
            &Method::GET,
            AuthMode::SessionCookieValue,
            Some("abc"),
            &CallerContext::default(),
            &CredentialNames::default(),
        )
        .await
        .unwrap();
        assert!(creds.csrf.is_none());

        let mut headers = HeaderMap::new();
        creds
            .merge_into(&mut headers, &url("http://example.com/"), &CredentialNames::default())
            .unwrap();
        assert_eq!(headers[COOKIE], "sessionid=abc");
        assert!(!headers.contains_key("x-csrftoken"));
    }

    #[tokio::test]
    async fn test_token_header() {
        let creds = Credentials::assemble(
            &Client::new(),
            &url("http://example.com/"),
            &Method::DELETE,
            AuthMode::Token,
            Some("t0k"),
            &CallerContext::default(),
            &CredentialNames::default(),
        )
        .await
        .unwrap();
        let mut headers = HeaderMap::new();
        creds
            .merge_into(&mut headers, &url("http://example.com/"), &CredentialNames::default())
            .unwrap();
        assert_eq!(headers[AUTHORIZATION], "Token t0k");
        assert!(creds.csrf.is_none());
    }

    #[test]
    fn test_preflight_timeout_from_config() {
        assert_eq!(CredentialNames::default().csrf_preflight_timeout, CSRF_PREFLIGHT_TIMEOUT);
        let config = ProbeConfig {
            csrf_preflight_timeout_ms: 250,
            ..ProbeConfig::default()
        };
        assert_eq!(
            CredentialNames::from_config(&config).csrf_preflight_timeout,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_response_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("theme=dark; Path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("csrftoken=abc123; Path=/; SameSite=Lax"));
        assert_eq!(response_cookie(&headers, "csrftoken").as_deref(), Some("abc123"));
        assert_eq!(response_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_caller_context_from_headers() {
        let names = CredentialNames::default();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sessionid=s1; csrftoken=c1"));
        let caller = CallerContext::from_headers(&headers, &names);
        assert_eq!(caller.session_cookie.as_deref(), Some("s1"));
        assert_eq!(caller.csrf_token.as_deref(), Some("c1"));

        headers.insert("x-csrftoken", HeaderValue::from_static("h1"));
        let caller = CallerContext::from_headers(&headers, &names);
        assert_eq!(caller.csrf_token.as_deref(), Some("h1"));
    }

    #[test]
    fn test_auth_mode_display() {
        assert_eq!(AuthMode::SessionCookieValue.to_string(), "session_cookie_value");
        assert_eq!(AuthMode::default(), AuthMode::None);
    }
}
