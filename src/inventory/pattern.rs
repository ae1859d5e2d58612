//! Route pattern normalization.
//!
//! # Responsibilities
//! - Strip framework regex anchors from pattern fragments
//! - Canonicalize full patterns to a leading-slash form
//! - Extract path parameters from regex named groups and bracket converters
//! - Render patterns into fillable test URL templates
//!
//! # Design Decisions
//! - Pure functions, no allocation beyond the returned values
//! - Regexes compiled once per process
//! - A named group ends at its first unescaped `)`; nested parentheses inside
//!   a named group are not balanced

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// `(?P<name>...)`, body ending at the first unescaped `)`.
static NAMED_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\?P<(\w+)>(?:\\.|[^)\\])*\)").expect("named group regex is valid")
});

/// `<converter:name>` or `<name>`.
static BRACKET_CONVERTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:(\w+):)?(\w+)>").expect("converter regex is valid"));

/// Where a parameter lives in the request. Only path parameters are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
}

/// A parameter discovered in a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub location: ParameterLocation,
    pub required: bool,
}

impl RouteParameter {
    fn path(name: &str, param_type: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type: param_type.to_string(),
            location: ParameterLocation::Path,
            required: true,
        }
    }
}

/// Removes a single leading `^` and a single trailing `$`.
pub fn strip_anchors(fragment: &str) -> &str {
    let fragment = fragment.strip_prefix('^').unwrap_or(fragment);
    fragment.strip_suffix('$').unwrap_or(fragment)
}

/// Ensures the pattern starts with `/`. Empty input maps to `/`.
pub fn clean_pattern(full: &str) -> String {
    if full.starts_with('/') {
        full.to_string()
    } else {
        format!("/{full}")
    }
}

/// Maps a bracket converter to its display type.
fn converter_type(converter: Option<&str>) -> &str {
    match converter {
        None | Some("str") => "string",
        Some("int") => "integer",
        Some("slug") => "slug",
        Some("uuid") => "UUID",
        Some("path") => "path",
        Some(other) => other,
    }
}

/// True when the match at `start` is the `<name>` part of a `(?P<name>` group.
fn inside_named_group(pattern: &str, start: usize) -> bool {
    pattern.as_bytes()[..start].ends_with(b"?P")
}

/// Extracts path parameters from a pattern.
///
/// Regex named groups come first, in source order, followed by bracket
/// converters in source order. A name seen earlier is never repeated.
pub fn extract_parameters(pattern: &str) -> Vec<RouteParameter> {
    let mut seen = HashSet::new();
    let mut params = Vec::new();

    for caps in NAMED_GROUP.captures_iter(pattern) {
        let name = &caps[1];
        if seen.insert(name.to_string()) {
            params.push(RouteParameter::path(name, "regex"));
        }
    }

    for caps in BRACKET_CONVERTER.captures_iter(pattern) {
        let whole = caps.get(0).map_or(0, |m| m.start());
        if inside_named_group(pattern, whole) {
            continue;
        }
        let name = &caps[2];
        if seen.insert(name.to_string()) {
            let converter = caps.get(1).map(|m| m.as_str());
            params.push(RouteParameter::path(name, converter_type(converter)));
        }
    }

    params
}

/// Renders a pattern as a URL path with `{name}` placeholders.
///
/// `/api/<int:pk>/(?P<slug>[-\w]+)/` becomes `/api/{pk}/{slug}/`.
pub fn url_template(pattern: &str) -> String {
    let groups = NAMED_GROUP.replace_all(pattern, |caps: &Captures<'_>| format!("{{{}}}", &caps[1]));
    let rendered = BRACKET_CONVERTER
        .replace_all(&groups, |caps: &Captures<'_>| format!("{{{}}}", &caps[2]));
    clean_pattern(&rendered)
}
