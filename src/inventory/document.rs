//! Route document decoding.
//!
//! # Design Decisions
//! - Documents are decoded entry by entry: a malformed entry is logged and
//!   skipped, a malformed handler degrades to no metadata, and the rest of
//!   the tree survives
//! - JSON is parsed without serde_json's recursion limit so the collector's
//!   depth cap decides what is skipped; a byte scan bounds nesting first
//! - TOML documents remain bound by the TOML parser's own nesting limit

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::inventory::tree::{GroupNode, HandlerCapabilities, LeafNode, RouteNode};

/// Deepest group nesting a route document may carry.
pub const MAX_DOCUMENT_DEPTH: usize = 128;

/// Each group costs two JSON levels (the node and its `children`), plus
/// headroom for the document itself and handler metadata.
const MAX_JSON_NESTING: usize = 2 * MAX_DOCUMENT_DEPTH + 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Json,
}

/// Decodes the `routes` array of a document.
///
/// Fails only when the document as a whole is unreadable.
pub fn decode_document(content: &str, format: DocumentFormat) -> Result<Vec<RouteNode>, String> {
    let document = match format {
        DocumentFormat::Json => parse_json(content)?,
        DocumentFormat::Toml => toml::from_str::<Value>(content).map_err(|e| e.to_string())?,
    };
    let Value::Object(fields) = &document else {
        return Err(format!("expected a table at the top level, found {}", type_name(&document)));
    };
    match fields.get("routes") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(decode_nodes(items, "routes")),
        Some(other) => Err(format!("'routes' must be an array, found {}", type_name(other))),
    }
}

fn parse_json(content: &str) -> Result<Value, String> {
    let nesting = json_nesting(content);
    if nesting > MAX_JSON_NESTING {
        return Err(format!(
            "document nests {nesting} levels deep, the limit is {MAX_JSON_NESTING}"
        ));
    }
    let mut deserializer = serde_json::Deserializer::from_str(content);
    deserializer.disable_recursion_limit();
    let value = Value::deserialize(&mut deserializer).map_err(|e| e.to_string())?;
    deserializer.end().map_err(|e| e.to_string())?;
    Ok(value)
}

/// Deepest bracket nesting outside of strings.
fn json_nesting(content: &str) -> usize {
    let (mut depth, mut deepest) = (0usize, 0usize);
    let (mut in_string, mut escaped) = (false, false);
    for byte in content.bytes() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

fn decode_nodes(items: &[Value], path: &str) -> Vec<RouteNode> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let entry = format!("{path}[{index}]");
            match decode_node(item, &entry) {
                Ok(node) => Some(node),
                Err(reason) => {
                    tracing::warn!(entry = %entry, reason = %reason, "Skipping malformed route entry");
                    None
                }
            }
        })
        .collect()
}

fn decode_node(value: &Value, entry: &str) -> Result<RouteNode, String> {
    let Value::Object(fields) = value else {
        return Err(format!("expected a table, found {}", type_name(value)));
    };
    match fields.get("kind").and_then(Value::as_str) {
        Some("group") => {
            let children = match fields.get("children") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => decode_nodes(items, &format!("{entry}.children")),
                Some(other) => {
                    return Err(format!("'children' must be an array, found {}", type_name(other)))
                }
            };
            Ok(RouteNode::Group(GroupNode {
                prefix: string_field(fields, "prefix")?.unwrap_or_default(),
                namespace: optional_string(fields, "namespace", entry),
                children,
            }))
        }
        Some("leaf") => Ok(RouteNode::Leaf(LeafNode {
            pattern: string_field(fields, "pattern")?.unwrap_or_default(),
            name: optional_string(fields, "name", entry),
            handler: decode_handler(fields.get("handler"), entry),
        })),
        Some(other) => Err(format!("unknown kind '{other}'")),
        None => Err("missing 'kind'".to_string()),
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(format!("'{key}' must be a string, found {}", type_name(other))),
    }
}

/// Like [`string_field`], but a bad value only costs the field.
fn optional_string(fields: &Map<String, Value>, key: &str, entry: &str) -> Option<String> {
    string_field(fields, key).unwrap_or_else(|reason| {
        tracing::warn!(entry = %entry, reason = %reason, "Ignoring malformed route field");
        None
    })
}

fn decode_handler(value: Option<&Value>, entry: &str) -> Option<HandlerCapabilities> {
    let value = value.filter(|v| !v.is_null())?;
    match HandlerCapabilities::deserialize(value) {
        Ok(handler) => Some(handler),
        Err(e) => {
            tracing::warn!(entry = %entry, error = %e, "Ignoring malformed handler metadata");
            None
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "table",
    }
}
