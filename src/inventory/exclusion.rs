//! Route exclusion denylist.

use regex::Regex;
use thiserror::Error;

use crate::inventory::descriptor::RouteDescriptor;

#[derive(Debug, Error)]
#[error("invalid exclusion pattern '{pattern}': {source}")]
pub struct ExclusionError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Ordered, compiled exclusion patterns.
///
/// Patterns are matched against route patterns with their leading `/`
/// removed, so `^admin/` excludes `/admin/login/`.
#[derive(Debug, Clone, Default)]
pub struct RouteExclusions {
    patterns: Vec<Regex>,
}

impl RouteExclusions {
    /// Compiles every pattern, failing on the first invalid one.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ExclusionError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|source| ExclusionError {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True when any pattern matches the route.
    pub fn excludes(&self, pattern: &str) -> bool {
        let target = pattern.strip_prefix('/').unwrap_or(pattern);
        self.patterns.iter().any(|re| re.is_match(target))
    }

    /// Drops excluded routes, preserving the order of the rest.
    pub fn filter(&self, routes: Vec<RouteDescriptor>) -> Vec<RouteDescriptor> {
        if self.is_empty() {
            return routes;
        }
        let before = routes.len();
        let kept: Vec<_> = routes
            .into_iter()
            .filter(|route| !self.excludes(&route.pattern))
            .collect();
        tracing::debug!(excluded = before - kept.len(), kept = kept.len(), "Applied route exclusions");
        kept
    }
}
