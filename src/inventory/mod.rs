//! Route inventory subsystem.
//!
//! # Data Flow
//! ```text
//! RouteSource (adapter tree or route document)
//!     → document.rs (entry-by-entry decoding of files)
//!     → collector.rs (pre-order walk, prefix/namespace accumulation)
//!         → pattern.rs (anchors, leading slash, parameters)
//!         → introspect.rs (verbs, schema)
//!     → exclusion.rs (regex denylist)
//!     → RouteInventory (read-only views: list, grouped, stats, search)
//! ```
//!
//! # Design Decisions
//! - Inventory is rebuilt per request; a collector caches only for its own lifetime
//! - Discovery order is preserved in every view
//! - Descriptors are immutable once produced

pub mod collector;
pub mod descriptor;
pub mod document;
pub mod exclusion;
pub mod introspect;
pub mod pattern;
pub mod source;
pub mod tree;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

pub use collector::{collect_routes, RouteCollector, DEFAULT_MAX_DEPTH};
pub use descriptor::{RouteDescriptor, SchemaField, SchemaInfo, SchemaOutcome};
pub use exclusion::{ExclusionError, RouteExclusions};
pub use source::{FileRouteSource, RouteSource, RouteSources, SourceError, StaticRouteSource};
pub use tree::{HandlerCapabilities, RouteNode, SchemaAccessor};

/// Group key for routes without a namespace.
pub const ROOT_NAMESPACE: &str = "_root";

/// Aggregate numbers over an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryStats {
    pub total_count: usize,
    pub named_count: usize,
    pub namespace_count: usize,
    pub namespaces: Vec<String>,
}

/// An ordered, filtered list of route descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteInventory {
    routes: Vec<RouteDescriptor>,
}

impl RouteInventory {
    pub fn new(routes: Vec<RouteDescriptor>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes keyed by namespace; unnamespaced routes go under `_root`.
    pub fn grouped(&self) -> BTreeMap<String, Vec<RouteDescriptor>> {
        let mut groups: BTreeMap<String, Vec<RouteDescriptor>> = BTreeMap::new();
        for route in &self.routes {
            let key = route.namespace.as_deref().unwrap_or(ROOT_NAMESPACE);
            groups.entry(key.to_string()).or_default().push(route.clone());
        }
        groups
    }

    pub fn stats(&self) -> InventoryStats {
        let namespaces: BTreeSet<&str> = self
            .routes
            .iter()
            .filter_map(|r| r.namespace.as_deref())
            .collect();
        InventoryStats {
            total_count: self.routes.len(),
            named_count: self.routes.iter().filter(|r| r.name.is_some()).count(),
            namespace_count: namespaces.len(),
            namespaces: namespaces.into_iter().map(str::to_string).collect(),
        }
    }

    /// Case-insensitive substring search over pattern, name and handler.
    pub fn search(&self, query: &str) -> Vec<RouteDescriptor> {
        let needle = query.to_lowercase();
        self.routes
            .iter()
            .filter(|r| {
                r.pattern.to_lowercase().contains(&needle)
                    || r.name.as_ref().is_some_and(|n| n.to_lowercase().contains(&needle))
                    || r.handler_name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// First route with the given pattern; the leading `/` is optional.
    pub fn find(&self, pattern: &str) -> Option<&RouteDescriptor> {
        let wanted = pattern::clean_pattern(pattern);
        self.routes.iter().find(|r| r.pattern == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> RouteInventory {
        let tree = vec![
            RouteNode::leaf("", Some("home"), None),
            RouteNode::group(
                "api/",
                Some("api"),
                vec![
                    RouteNode::leaf("articles/", Some("article-list"), None),
                    RouteNode::leaf("health/", None, None),
                ],
            ),
            RouteNode::group(
                "admin/",
                Some("admin"),
                vec![RouteNode::leaf("login/", Some("login"), None)],
            ),
        ];
        RouteInventory::new(collect_routes(&tree, DEFAULT_MAX_DEPTH))
    }

    #[test]
    fn test_grouped_by_namespace() {
        let grouped = inventory().grouped();
        assert_eq!(grouped.keys().collect::<Vec<_>>(), vec!["_root", "admin", "api"]);
        assert_eq!(grouped["api"].len(), 2);
        assert_eq!(grouped["api"][0].pattern, "/api/articles/");
        assert_eq!(grouped["_root"][0].pattern, "/");
    }

    #[test]
    fn test_stats() {
        let stats = inventory().stats();
        assert_eq!(
            stats,
            InventoryStats {
                total_count: 4,
                named_count: 4,
                namespace_count: 2,
                namespaces: vec!["admin".into(), "api".into()],
            }
        );
    }

    #[test]
    fn test_search() {
        let inv = inventory();
        let hits = inv.search("ARTICLE");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name.as_deref(), Some("api:article-list"));
        assert_eq!(inv.search("unknown").len(), 4);
        assert!(inv.search("nothing-matches").is_empty());
    }

    #[test]
    fn test_find() {
        let inv = inventory();
        assert_eq!(inv.find("/admin/login/").unwrap().name.as_deref(), Some("admin:login"));
        assert_eq!(inv.find("api/health/").unwrap().pattern, "/api/health/");
        assert!(inv.find("/missing/").is_none());
    }
}
