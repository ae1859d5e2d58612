//! Renders a probe as an equivalent curl command.
//!
//! The command mirrors what [`SafeRequestProxy`](crate::probe::SafeRequestProxy)
//! would send, except that credentials taken from the caller's own session are
//! replaced by placeholders.

use reqwest::Method;

use crate::probe::auth::{AuthMode, CredentialNames};
use crate::probe::request::{is_mutating, ProbeRequest};

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./:=@%+,".contains(&b))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Build a single-line curl command for `request`.
pub fn to_curl(request: &ProbeRequest, names: &CredentialNames) -> String {
    let method = request
        .verb()
        .unwrap_or_else(|_| Method::from_bytes(request.method.trim().as_bytes()).unwrap_or(Method::GET));
    let mut parts = vec!["curl".to_string()];

    if method != Method::GET {
        parts.push("-X".to_string());
        parts.push(shell_quote(method.as_str()));
    }
    parts.push(shell_quote(request.url.trim()));

    for (name, value) in &request.headers {
        parts.push("-H".to_string());
        parts.push(shell_quote(&format!("{}: {}", name.trim(), value)));
    }

    let value = request.auth_value.as_deref().unwrap_or("").trim();
    match request.auth_mode {
        AuthMode::None => {}
        AuthMode::Session | AuthMode::SessionCookieValue => {
            let session = if request.auth_mode == AuthMode::Session {
                format!("<{}>", names.session_cookie)
            } else {
                value.to_string()
            };
            let mut cookie = format!("{}={}", names.session_cookie, session);
            if is_mutating(&method) {
                cookie.push_str(&format!("; {}=<{}>", names.csrf_cookie, names.csrf_cookie));
                parts.push("-H".to_string());
                parts.push(shell_quote(&format!("{}: <{}>", names.csrf_header, names.csrf_cookie)));
            }
            parts.push("-b".to_string());
            parts.push(shell_quote(&cookie));
        }
        AuthMode::Basic => {
            parts.push("-u".to_string());
            parts.push(shell_quote(value));
        }
        AuthMode::Bearer => {
            parts.push("-H".to_string());
            parts.push(shell_quote(&format!("Authorization: Bearer {value}")));
        }
        AuthMode::Token => {
            parts.push("-H".to_string());
            parts.push(shell_quote(&format!("Authorization: Token {value}")));
        }
    }

    if let Some(body) = request.outgoing_body(&method) {
        let has_content_type = request
            .headers
            .keys()
            .any(|name| name.trim().eq_ignore_ascii_case("content-type"));
        if !has_content_type && serde_json::from_str::<serde_json::Value>(body).is_ok() {
            parts.push("-H".to_string());
            parts.push(shell_quote("Content-Type: application/json"));
        }
        parts.push("--data-raw".to_string());
        parts.push(shell_quote(body));
    }

    if let Some(secs) = request.timeout_secs.filter(|secs| *secs > 0) {
        parts.push("--max-time".to_string());
        parts.push(secs.to_string());
    }

    parts.join(" ")
}
