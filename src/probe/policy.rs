//! SSRF policy for outbound probes.
//!
//! # Responsibilities
//! - Gate probes on the testing switch
//! - Parse and validate destination URLs
//! - Enforce the host allowlist, or the private-network denylist
//! - Bound operator-selected timeouts
//!
//! # Design Decisions
//! - An allowlist, when configured, fully replaces the denylist
//! - Allowlist matching is exact against the parsed host
//! - The denylist works on parsed hosts, so alternate IPv4 spellings
//!   (`0x7f.1`, `2130706433`) are caught as loopback
//! - The same check runs again on every redirect hop
//! - URLs leave this crate (logs, error bodies) only with userinfo removed

use std::collections::BTreeSet;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use url::{Host, Url};

use crate::config::PanelConfig;
use crate::probe::error::ProbeError;

/// Probe policy derived from configuration.
#[derive(Debug, Clone)]
pub struct ProxyPolicy {
    pub enabled: bool,
    pub allowed_hosts: Option<BTreeSet<String>>,
    pub default_timeout: Duration,
    pub max_timeout: Duration,
}

impl Default for ProxyPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_hosts: None,
            default_timeout: Duration::from_secs(30),
            max_timeout: Duration::from_secs(120),
        }
    }
}

impl ProxyPolicy {
    pub fn from_config(config: &PanelConfig) -> Self {
        Self {
            enabled: config.testing.enable_testing,
            allowed_hosts: config
                .testing
                .allowed_hosts
                .as_ref()
                .map(|hosts| hosts.iter().cloned().collect()),
            default_timeout: Duration::from_secs(config.probe.default_timeout_secs),
            max_timeout: Duration::from_secs(config.probe.max_timeout_secs),
        }
    }

    /// Policy with an allowlist, mostly for tests and embedding.
    pub fn with_allowed_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_hosts = Some(hosts.into_iter().map(Into::into).collect());
        self
    }

    /// Parses `raw` and checks the destination host.
    pub fn validate_url(&self, raw: &str) -> Result<Url, ProbeError> {
        let invalid = |reason: &str| ProbeError::InvalidUrl {
            url: redact_url(raw),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("only http and https URLs can be tested"));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid("URL has no hostname"));
        }

        self.check_host(&url)?;
        Ok(url)
    }

    /// Applies the allowlist or the default denylist to an already parsed URL.
    pub fn check_host(&self, url: &Url) -> Result<(), ProbeError> {
        let (Some(host_str), Some(host)) = (url.host_str(), url.host()) else {
            return Err(ProbeError::InvalidUrl {
                url: redacted(url),
                reason: "URL has no hostname".to_string(),
            });
        };

        if let Some(allowed) = &self.allowed_hosts {
            return if host_allowed(allowed, &host, host_str) {
                Ok(())
            } else {
                Err(ProbeError::HostNotAllowed {
                    host: host_str.to_string(),
                })
            };
        }

        match denylist_reason(&host) {
            Some(reason) => Err(ProbeError::HostBlocked {
                host: host_str.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Picks the probe timeout: operator value if given, bounded by the maximum.
    pub fn effective_timeout(&self, requested_secs: Option<u64>) -> Duration {
        match requested_secs.filter(|secs| *secs > 0) {
            Some(secs) => Duration::from_secs(secs).min(self.max_timeout),
            None => self.default_timeout,
        }
    }
}

/// IPv6 hosts compare as addresses, so `::1` and `[::1]` both match.
fn host_allowed(allowed: &BTreeSet<String>, host: &Host<&str>, host_str: &str) -> bool {
    match host {
        Host::Ipv6(ip) => allowed
            .iter()
            .filter_map(|entry| parse_ipv6_entry(entry))
            .any(|entry| entry == *ip),
        _ => allowed.contains(host_str),
    }
}

/// Parses an allowlist entry as an IPv6 address, brackets optional.
pub fn parse_ipv6_entry(entry: &str) -> Option<Ipv6Addr> {
    let bare = entry
        .strip_prefix('[')
        .and_then(|e| e.strip_suffix(']'))
        .unwrap_or(entry);
    bare.parse().ok()
}

/// `url` without username or password.
pub fn redacted(url: &Url) -> String {
    if url.username().is_empty() && url.password().is_none() {
        return url.to_string();
    }
    let mut clean = url.clone();
    // Only fails for URLs that cannot carry credentials in the first place.
    let _ = clean.set_username("");
    let _ = clean.set_password(None);
    clean.to_string()
}

/// Operator-supplied URL text without userinfo, parseable or not.
pub fn redact_url(raw: &str) -> String {
    if let Ok(url) = Url::parse(raw.trim()) {
        return redacted(&url);
    }
    let Some(scheme_end) = raw.find("://") else {
        return raw.to_string();
    };
    let authority_start = scheme_end + 3;
    let rest = &raw[authority_start..];
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}{}", &raw[..authority_start], &rest[at + 1..]),
        None => raw.to_string(),
    }
}

/// Returns why a host is on the default denylist, if it is.
pub fn denylist_reason(host: &Host<&str>) -> Option<&'static str> {
    match host {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            if domain == "localhost" || domain.ends_with(".localhost") {
                Some("localhost")
            } else {
                None
            }
        }
        Host::Ipv4(ip) => ipv4_reason(ip),
        Host::Ipv6(ip) => ipv6_reason(ip),
    }
}

fn ipv4_reason(ip: &Ipv4Addr) -> Option<&'static str> {
    if ip.is_loopback() {
        Some("loopback address")
    } else if ip.is_private() {
        Some("private network address")
    } else if ip.is_link_local() {
        Some("link-local or cloud metadata address")
    } else if ip.is_unspecified() {
        Some("unspecified address")
    } else {
        None
    }
}

fn ipv6_reason(ip: &Ipv6Addr) -> Option<&'static str> {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return ipv4_reason(&mapped);
    }
    let first = ip.segments()[0];
    if ip.is_loopback() {
        Some("loopback address")
    } else if ip.is_unspecified() {
        Some("unspecified address")
    } else if first & 0xffc0 == 0xfe80 {
        Some("link-local address")
    } else if first & 0xfe00 == 0xfc00 {
        Some("unique local address")
    } else {
        None
    }
}
