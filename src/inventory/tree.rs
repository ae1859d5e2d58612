//! Routing tree supplied by a framework adapter.
//!
//! The tree is plain data: adapters translate their framework's resolver
//! objects into these nodes, and the file-backed source deserializes them
//! directly from a route document.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A node in the routing tree.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteNode {
    /// An included sub-tree sharing a prefix and, optionally, a namespace.
    Group(GroupNode),
    /// A reachable endpoint.
    Leaf(LeafNode),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct GroupNode {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub children: Vec<RouteNode>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct LeafNode {
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub handler: Option<HandlerCapabilities>,
}

/// What an adapter could learn about a route's handler.
///
/// Every field is optional; the introspector falls back to defaults for
/// anything the adapter could not determine.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HandlerCapabilities {
    /// Qualified handler name, e.g. `api.views.article_list`.
    pub qualified_name: Option<String>,
    /// Qualified class name for class-based handlers.
    pub class_name: Option<String>,
    /// Verbs the handler declares it accepts.
    pub method_allow_list: Option<Vec<String>>,
    /// Verbs the handler actually implements.
    pub implemented_methods: BTreeSet<String>,
    /// Verb to action mapping for resource-style handlers (viewsets).
    pub action_map: Option<BTreeMap<String, String>>,
    pub schema: Option<SchemaAccessor>,
}

/// How the request/response schema of a handler can be obtained.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaAccessor {
    /// A concrete schema type known ahead of time.
    Concrete(SchemaDeclaration),
    /// The schema is chosen per request (e.g. `get_serializer_class`).
    Dynamic { accessor: Option<String> },
}

/// A concrete schema type as declared by the adapter.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct SchemaDeclaration {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FieldDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub help_text: Option<String>,
    pub choices: Option<Vec<FieldChoice>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldChoice {
    pub value: String,
    pub label: String,
}

impl RouteNode {
    /// Shorthand for building a group node.
    pub fn group(prefix: &str, namespace: Option<&str>, children: Vec<RouteNode>) -> Self {
        RouteNode::Group(GroupNode {
            prefix: prefix.to_string(),
            namespace: namespace.map(str::to_string),
            children,
        })
    }

    /// Shorthand for building a leaf node.
    pub fn leaf(pattern: &str, name: Option<&str>, handler: Option<HandlerCapabilities>) -> Self {
        RouteNode::Leaf(LeafNode {
            pattern: pattern.to_string(),
            name: name.map(str::to_string),
            handler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_route_document_nodes() {
        let raw = r#"
            [[routes]]
            kind = "group"
            prefix = "^api/"
            namespace = "api"

            [[routes.children]]
            kind = "leaf"
            pattern = "articles/<int:pk>/"
            name = "article-detail"

            [routes.children.handler]
            qualified_name = "api.views.ArticleDetailView"
            implemented_methods = ["get", "put"]

            [routes.children.handler.schema]
            kind = "dynamic"
            accessor = "get_serializer_class"
        "#;

        #[derive(Deserialize)]
        struct Doc {
            routes: Vec<RouteNode>,
        }

        let doc: Doc = toml::from_str(raw).unwrap();
        let RouteNode::Group(group) = &doc.routes[0] else {
            panic!("expected group");
        };
        assert_eq!(group.prefix, "^api/");
        assert_eq!(group.namespace.as_deref(), Some("api"));

        let RouteNode::Leaf(leaf) = &group.children[0] else {
            panic!("expected leaf");
        };
        let handler = leaf.handler.as_ref().unwrap();
        assert!(handler.implemented_methods.contains("put"));
        assert!(matches!(handler.schema, Some(SchemaAccessor::Dynamic { .. })));
    }
}
