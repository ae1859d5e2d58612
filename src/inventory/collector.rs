//! Routing tree traversal.
//!
//! # Responsibilities
//! - Flatten a namespaced routing tree into route descriptors
//! - Accumulate prefixes and namespaces from enclosing groups
//! - Apply the exclusion denylist
//! - Cache one inventory per collector instance
//!
//! # Design Decisions
//! - Iterative pre-order walk with an explicit stack; no recursion
//! - Depth-capped, since adapter-supplied trees are untrusted
//! - Best-effort: a bad subtree is skipped and logged, never fatal

use std::sync::{Arc, OnceLock};

use crate::inventory::descriptor::RouteDescriptor;
use crate::inventory::exclusion::RouteExclusions;
use crate::inventory::introspect::introspect;
use crate::inventory::pattern::{clean_pattern, extract_parameters, strip_anchors};
use crate::inventory::source::{RouteSource, SourceError};
use crate::inventory::tree::{LeafNode, RouteNode};
use crate::inventory::RouteInventory;
use crate::observability::metrics;

/// Default nesting limit for group nodes.
pub const DEFAULT_MAX_DEPTH: usize = 64;

struct Frame<'a> {
    node: &'a RouteNode,
    namespace: Option<String>,
    prefix: String,
    depth: usize,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn join_namespace(parent: Option<&str>, own: Option<&str>) -> Option<String> {
    match (non_empty(parent), non_empty(own)) {
        (Some(parent), Some(own)) => Some(format!("{parent}:{own}")),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}

fn build_descriptor(leaf: &LeafNode, namespace: Option<&str>, prefix: &str) -> RouteDescriptor {
    let pattern = clean_pattern(&format!("{prefix}{}", strip_anchors(&leaf.pattern)));
    // An unnamed leaf inside a namespace is addressed by the namespace alone.
    let name = join_namespace(namespace, leaf.name.as_deref());
    let handler = introspect(leaf.handler.as_ref());

    RouteDescriptor {
        pattern,
        name,
        namespace: namespace.map(str::to_string),
        handler_name: handler.handler_name,
        handler_class: handler.handler_class,
        http_methods: handler.http_methods,
        // Parameters may live inside the anchored fragment.
        parameters: extract_parameters(&leaf.pattern),
        schema: handler.schema,
    }
}

/// Flattens a routing tree in pre-order.
///
/// Groups deeper than `max_depth` are skipped along with their subtree.
pub fn collect_routes(roots: &[RouteNode], max_depth: usize) -> Vec<RouteDescriptor> {
    let mut routes = Vec::new();
    let mut stack: Vec<Frame<'_>> = roots
        .iter()
        .rev()
        .map(|node| Frame {
            node,
            namespace: None,
            prefix: String::new(),
            depth: 0,
        })
        .collect();

    while let Some(frame) = stack.pop() {
        match frame.node {
            RouteNode::Group(group) => {
                if frame.depth >= max_depth {
                    tracing::warn!(
                        prefix = %frame.prefix,
                        depth = frame.depth,
                        max_depth,
                        "Routing tree exceeds depth limit, skipping subtree"
                    );
                    continue;
                }
                let namespace =
                    join_namespace(frame.namespace.as_deref(), group.namespace.as_deref());
                let prefix = format!("{}{}", frame.prefix, strip_anchors(&group.prefix));
                for child in group.children.iter().rev() {
                    stack.push(Frame {
                        node: child,
                        namespace: namespace.clone(),
                        prefix: prefix.clone(),
                        depth: frame.depth + 1,
                    });
                }
            }
            RouteNode::Leaf(leaf) => {
                routes.push(build_descriptor(leaf, frame.namespace.as_deref(), &frame.prefix));
            }
        }
    }

    routes
}

/// Builds route inventories from a route source.
///
/// A collector computes its inventory once and serves the cached copy for
/// the rest of its lifetime; create a new collector to observe tree changes.
pub struct RouteCollector {
    source: Arc<dyn RouteSource>,
    exclusions: RouteExclusions,
    max_depth: usize,
    cache: OnceLock<Arc<RouteInventory>>,
}

impl RouteCollector {
    pub fn new(source: Arc<dyn RouteSource>, exclusions: RouteExclusions, max_depth: usize) -> Self {
        Self {
            source,
            exclusions,
            max_depth,
            cache: OnceLock::new(),
        }
    }

    /// Returns the filtered inventory, loading the tree on first use.
    pub fn inventory(&self) -> Result<Arc<RouteInventory>, SourceError> {
        if let Some(cached) = self.cache.get() {
            return Ok(cached.clone());
        }

        let roots = self.source.load()?;
        let collected = collect_routes(&roots, self.max_depth);
        let total = collected.len();
        let routes = self.exclusions.filter(collected);

        tracing::debug!(
            source = %self.source.describe(),
            collected = total,
            listed = routes.len(),
            "Route inventory built"
        );
        metrics::record_inventory_size(routes.len());

        let inventory = Arc::new(RouteInventory::new(routes));
        Ok(self.cache.get_or_init(|| inventory).clone())
    }
}
