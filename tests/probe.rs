//! End-to-end probe behavior against a local mock backend.

mod common;

use std::time::Duration;

use serde_json::json;

use common::{refused_url, start_fixed_backend, start_mock_backend, MockResponse};
use urls_panel::config::ProbeConfig;
use urls_panel::probe::{
    AuthMode, CallerContext, CsrfSource, ProbeError, ProbeRequest, ProxyPolicy, SafeRequestProxy,
};

/// The mock backend lives on loopback, which only an allowlist can open up.
fn loopback_proxy() -> SafeRequestProxy {
    SafeRequestProxy::new(
        ProxyPolicy::default().with_allowed_hosts(["127.0.0.1"]),
        &ProbeConfig::default(),
    )
    .unwrap()
}

fn caller_with_session(session: &str) -> CallerContext {
    CallerContext {
        session_cookie: Some(session.to_string()),
        csrf_token: None,
    }
}

#[tokio::test]
async fn test_json_response_round_trip() {
    let backend = start_fixed_backend(MockResponse::json(200, r#"{"success": true}"#)).await;

    let response = loopback_proxy()
        .execute(
            &ProbeRequest::new("GET", &backend.url("/api/test/")),
            &CallerContext::default(),
        )
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.status_text, "OK");
    assert!(response.is_json);
    assert_eq!(response.body, json!({"success": true}));
    assert_eq!(response.final_url, backend.url("/api/test/"));
    assert_eq!(response.headers["content-type"], "application/json");
    assert!(!response.truncated);
    assert!(response.csrf.is_none());
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_text_response() {
    let backend = start_fixed_backend(MockResponse::text(404, "<h1>Not Found</h1>")).await;

    let response = loopback_proxy()
        .execute(&ProbeRequest::new("GET", &backend.url("/missing/")), &CallerContext::default())
        .await
        .unwrap();

    assert_eq!(response.status_code, 404);
    assert!(!response.is_json);
    assert_eq!(response.body, json!("<h1>Not Found</h1>"));
}

#[tokio::test]
async fn test_disabled_makes_no_calls() {
    let backend = start_fixed_backend(MockResponse::json(200, "{}")).await;
    let policy = ProxyPolicy {
        enabled: false,
        ..ProxyPolicy::default().with_allowed_hosts(["127.0.0.1"])
    };
    let proxy = SafeRequestProxy::new(policy, &ProbeConfig::default()).unwrap();

    let err = proxy
        .execute(&ProbeRequest::new("GET", &backend.url("/")), &CallerContext::default())
        .await
        .unwrap_err();

    assert_eq!(err, ProbeError::Disabled);
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_denylist_blocks_loopback_without_calls() {
    let backend = start_fixed_backend(MockResponse::json(200, "{}")).await;
    let proxy = SafeRequestProxy::new(ProxyPolicy::default(), &ProbeConfig::default()).unwrap();

    let err = proxy
        .execute(&ProbeRequest::new("GET", &backend.url("/")), &CallerContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::HostBlocked { ref host, .. } if host == "127.0.0.1"));
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_allowlist_miss_makes_no_calls() {
    let backend = start_fixed_backend(MockResponse::json(200, "{}")).await;
    let proxy = SafeRequestProxy::new(
        ProxyPolicy::default().with_allowed_hosts(["example.com"]),
        &ProbeConfig::default(),
    )
    .unwrap();

    let err = proxy
        .execute(&ProbeRequest::new("GET", &backend.url("/")), &CallerContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::HostNotAllowed { .. }));
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_session_post_harvests_csrf_token() {
    let backend = start_mock_backend(|req| match req.method.as_str() {
        "GET" => MockResponse::text(200, "ok")
            .with_header("Set-Cookie", "csrftoken=pre123; Path=/; SameSite=Lax"),
        _ => MockResponse::json(201, r#"{"id": 7}"#),
    })
    .await;

    let response = loopback_proxy()
        .execute(
            &ProbeRequest::new("POST", &backend.url("/api/items/"))
                .body(r#"{"name": "widget"}"#)
                .auth(AuthMode::Session, None),
            &caller_with_session("sess-1"),
        )
        .await
        .unwrap();

    assert_eq!(response.status_code, 201);
    assert_eq!(response.csrf, Some(CsrfSource::Preflight));

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);

    let preflight = &requests[0];
    assert_eq!(preflight.method, "GET");
    assert_eq!(preflight.path, "/");
    assert_eq!(preflight.header("cookie"), Some("sessionid=sess-1"));

    let post = &requests[1];
    assert_eq!(post.method, "POST");
    assert_eq!(post.path, "/api/items/");
    assert_eq!(post.header("x-csrftoken"), Some("pre123"));
    assert_eq!(post.header("cookie"), Some("sessionid=sess-1; csrftoken=pre123"));
    assert_eq!(post.header("content-type"), Some("application/json"));
    assert_eq!(post.body, r#"{"name": "widget"}"#);
}

#[tokio::test]
async fn test_caller_csrf_token_skips_preflight() {
    let backend = start_fixed_backend(MockResponse::json(200, "{}")).await;
    let caller = CallerContext {
        session_cookie: Some("sess-2".into()),
        csrf_token: Some("caller-token".into()),
    };

    let response = loopback_proxy()
        .execute(
            &ProbeRequest::new("DELETE", &backend.url("/api/items/7/")).auth(AuthMode::Session, None),
            &caller,
        )
        .await
        .unwrap();

    assert_eq!(response.csrf, Some(CsrfSource::Caller));
    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].header("x-csrftoken"), Some("caller-token"));
}

#[tokio::test]
async fn test_failed_csrf_harvest_still_sends_probe() {
    // The origin sets no CSRF cookie.
    let backend = start_fixed_backend(MockResponse::json(403, r#"{"detail": "CSRF"}"#)).await;

    let response = loopback_proxy()
        .execute(
            &ProbeRequest::new("PUT", &backend.url("/api/items/7/"))
                .body("{}")
                .auth(AuthMode::SessionCookieValue, Some("operator-session")),
            &CallerContext::default(),
        )
        .await
        .unwrap();

    assert_eq!(response.status_code, 403);
    assert!(matches!(response.csrf, Some(CsrfSource::Unavailable { .. })));

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, "PUT");
    assert_eq!(requests[1].header("cookie"), Some("sessionid=operator-session"));
    assert_eq!(requests[1].header("x-csrftoken"), None);
}

#[tokio::test]
async fn test_hung_csrf_preflight_still_sends_request() {
    let backend = start_mock_backend(|req| match req.method.as_str() {
        "GET" => MockResponse::text(200, "ok")
            .with_header("Set-Cookie", "csrftoken=late; Path=/")
            .delayed(Duration::from_secs(3)),
        _ => MockResponse::json(201, r#"{"id": 8}"#),
    })
    .await;
    let config = ProbeConfig {
        csrf_preflight_timeout_ms: 200,
        ..ProbeConfig::default()
    };
    let proxy = SafeRequestProxy::new(
        ProxyPolicy::default().with_allowed_hosts(["127.0.0.1"]),
        &config,
    )
    .unwrap();

    let started = std::time::Instant::now();
    let response = proxy
        .execute(
            &ProbeRequest::new("POST", &backend.url("/api/items/"))
                .body("{}")
                .auth(AuthMode::Session, None),
            &caller_with_session("sess-3"),
        )
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(response.status_code, 201);
    assert!(matches!(response.csrf, Some(CsrfSource::Unavailable { .. })));

    let requests = backend.requests();
    let post = requests.iter().find(|r| r.method == "POST").unwrap();
    assert_eq!(post.path, "/api/items/");
    assert_eq!(post.header("cookie"), Some("sessionid=sess-3"));
    assert_eq!(post.header("x-csrftoken"), None);
}

#[tokio::test]
async fn test_basic_bearer_and_token_auth() {
    let backend = start_fixed_backend(MockResponse::json(200, "{}")).await;
    let proxy = loopback_proxy();
    let caller = CallerContext::default();

    for (mode, value, expected) in [
        (AuthMode::Basic, "user:pass", "Basic dXNlcjpwYXNz"),
        (AuthMode::Bearer, "abc", "Bearer abc"),
        (AuthMode::Token, "t0k", "Token t0k"),
    ] {
        proxy
            .execute(&ProbeRequest::new("GET", &backend.url("/me/")).auth(mode, Some(value)), &caller)
            .await
            .unwrap();
        let last = backend.requests().pop().unwrap();
        assert_eq!(last.header("authorization"), Some(expected));
    }
}

#[tokio::test]
async fn test_non_json_body_sent_unchanged() {
    let backend = start_fixed_backend(MockResponse::text(200, "ok")).await;

    loopback_proxy()
        .execute(
            &ProbeRequest::new("PATCH", &backend.url("/form/"))
                .header("Content-Type", "text/plain")
                .body("a=1&b=2"),
            &CallerContext::default(),
        )
        .await
        .unwrap();

    let request = &backend.requests()[0];
    assert_eq!(request.body, "a=1&b=2");
    assert_eq!(request.header("content-type"), Some("text/plain"));
}

#[tokio::test]
async fn test_get_sends_no_body() {
    let backend = start_fixed_backend(MockResponse::text(200, "ok")).await;

    loopback_proxy()
        .execute(
            &ProbeRequest::new("GET", &backend.url("/")).body(r#"{"ignored": true}"#),
            &CallerContext::default(),
        )
        .await
        .unwrap();

    let request = &backend.requests()[0];
    assert!(request.body.is_empty());
    assert_eq!(request.header("content-type"), None);
}

#[tokio::test]
async fn test_timeout() {
    let backend =
        start_fixed_backend(MockResponse::json(200, "{}").delayed(Duration::from_secs(5))).await;

    let err = loopback_proxy()
        .execute(
            &ProbeRequest::new("GET", &backend.url("/slow/")).timeout_secs(1),
            &CallerContext::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Timeout { timeout_secs: 1, .. }));
    assert_eq!(err.status_code(), 408);
}

#[tokio::test]
async fn test_connection_refused() {
    let err = loopback_proxy()
        .execute(&ProbeRequest::new("GET", &refused_url().await), &CallerContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::ConnectionError { .. }));
    assert_eq!(err.status_code(), 502);
}

#[tokio::test]
async fn test_errors_do_not_echo_url_credentials() {
    let url = refused_url().await.replacen("http://", "http://user:secret@", 1);

    let err = loopback_proxy()
        .execute(&ProbeRequest::new("GET", &url), &CallerContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::ConnectionError { .. }));
    assert!(!err.to_string().contains("secret"));
    assert!(!err.to_string().contains("user:"));
}

#[tokio::test]
async fn test_redirect_within_allowlist_is_followed() {
    let backend = start_mock_backend(|req| match req.path.as_str() {
        "/old/" => MockResponse::redirect("/new/"),
        _ => MockResponse::json(200, r#"{"moved": true}"#),
    })
    .await;

    let response = loopback_proxy()
        .execute(&ProbeRequest::new("GET", &backend.url("/old/")), &CallerContext::default())
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.final_url, backend.url("/new/"));
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn test_redirect_to_disallowed_host_is_refused() {
    let backend = start_mock_backend(|req| {
        let port = req
            .header("host")
            .and_then(|h| h.rsplit(':').next())
            .unwrap_or("80")
            .to_string();
        MockResponse::redirect(&format!("http://localhost:{port}/internal/"))
    })
    .await;

    let err = loopback_proxy()
        .execute(&ProbeRequest::new("GET", &backend.url("/out/")), &CallerContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::HostNotAllowed { ref host } if host == "localhost"));
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_large_body_is_truncated() {
    let backend = start_fixed_backend(MockResponse::text(200, &"x".repeat(4096))).await;
    let config = ProbeConfig {
        max_response_bytes: 1024,
        ..ProbeConfig::default()
    };
    let proxy = SafeRequestProxy::new(
        ProxyPolicy::default().with_allowed_hosts(["127.0.0.1"]),
        &config,
    )
    .unwrap();

    let response = proxy
        .execute(&ProbeRequest::new("GET", &backend.url("/big/")), &CallerContext::default())
        .await
        .unwrap();

    assert!(response.truncated);
    assert_eq!(response.body.as_str().unwrap().len(), 1024);
}
