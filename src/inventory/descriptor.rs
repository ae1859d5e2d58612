//! Normalized route records produced by the collector.

use serde::{Deserialize, Serialize};

use crate::inventory::pattern::RouteParameter;
use crate::inventory::tree::FieldChoice;

/// Placeholder used when a handler cannot be identified.
pub const UNKNOWN_HANDLER: &str = "Unknown";

/// One reachable endpoint.
///
/// # Invariants
/// - `pattern` starts with `/` and carries no fragment anchors
/// - `http_methods` is never empty
/// - parameter names are unique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub pattern: String,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub handler_name: String,
    pub handler_class: Option<String>,
    pub http_methods: Vec<String>,
    pub parameters: Vec<RouteParameter>,
    pub schema: Option<SchemaInfo>,
}

/// Request/response schema of a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub schema_name: Option<String>,
    pub fields: Vec<SchemaField>,
    /// The schema is chosen at request time and cannot be listed ahead of it.
    pub is_dynamic: bool,
    pub outcome: SchemaOutcome,
}

/// Whether the field list is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SchemaOutcome {
    Complete,
    /// Instantiation failed; `fields` is empty.
    Partial { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub help_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<FieldChoice>>,
}
