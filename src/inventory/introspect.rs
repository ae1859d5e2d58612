//! Handler introspection.
//!
//! # Responsibilities
//! - Resolve the HTTP verbs a handler accepts
//! - Resolve the handler's request/response schema
//! - Fall back to defaults instead of failing
//!
//! # Design Decisions
//! - Works on adapter-produced capability descriptors, never live objects
//! - Schema instantiation failures surface as `SchemaOutcome::Partial`

use std::collections::HashSet;

use thiserror::Error;

use crate::inventory::descriptor::{SchemaField, SchemaInfo, SchemaOutcome, UNKNOWN_HANDLER};
use crate::inventory::tree::{HandlerCapabilities, SchemaAccessor, SchemaDeclaration};

/// Verbs in their canonical display order.
pub const CANONICAL_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Verbs reported when nothing better is known.
pub const DEFAULT_METHODS: [&str; 2] = ["GET", "POST"];

/// Errors raised while materializing a declared schema.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema '{schema}' declares a field without a name")]
    UnnamedField { schema: String },

    #[error("schema '{schema}' declares field '{field}' more than once")]
    DuplicateField { schema: String, field: String },

    #[error("field '{field}' of schema '{schema}' is both read-only and write-only")]
    ConflictingAccess { schema: String, field: String },
}

/// Handler metadata merged into a route descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerInfo {
    pub handler_name: String,
    pub handler_class: Option<String>,
    pub http_methods: Vec<String>,
    pub schema: Option<SchemaInfo>,
}

/// Derives handler metadata from an optional capability descriptor.
pub fn introspect(handler: Option<&HandlerCapabilities>) -> HandlerInfo {
    let Some(caps) = handler else {
        return HandlerInfo {
            handler_name: UNKNOWN_HANDLER.to_string(),
            handler_class: None,
            http_methods: default_methods(),
            schema: None,
        };
    };

    HandlerInfo {
        handler_name: caps
            .qualified_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_HANDLER.to_string()),
        handler_class: caps.class_name.clone().filter(|name| !name.is_empty()),
        http_methods: resolve_methods(caps),
        schema: resolve_schema(caps.schema.as_ref()),
    }
}

fn default_methods() -> Vec<String> {
    DEFAULT_METHODS.iter().map(|m| m.to_string()).collect()
}

fn canonical_rank(verb: &str) -> Option<usize> {
    CANONICAL_METHODS.iter().position(|m| *m == verb)
}

/// Resolves allowed verbs, in priority order: action map, allow-list,
/// implemented verbs, defaults.
pub fn resolve_methods(caps: &HandlerCapabilities) -> Vec<String> {
    let implemented: HashSet<String> = caps
        .implemented_methods
        .iter()
        .map(|m| m.to_ascii_uppercase())
        .collect();

    let mut methods: Vec<String> = if let Some(actions) = &caps.action_map {
        let mut verbs: Vec<String> = actions
            .keys()
            .map(|verb| verb.to_ascii_uppercase())
            .filter(|verb| canonical_rank(verb).is_some())
            .collect();
        if verbs.iter().any(|v| v == "GET") {
            verbs.push("HEAD".to_string());
        }
        verbs.push("OPTIONS".to_string());
        verbs.sort_by_key(|verb| canonical_rank(verb));
        verbs
    } else if let Some(allow_list) = &caps.method_allow_list {
        allow_list
            .iter()
            .map(|verb| verb.to_ascii_uppercase())
            .filter(|verb| implemented.contains(verb))
            .collect()
    } else {
        CANONICAL_METHODS
            .iter()
            .filter(|verb| implemented.contains(**verb))
            .map(|verb| verb.to_string())
            .collect()
    };

    let mut seen = HashSet::new();
    methods.retain(|verb| seen.insert(verb.clone()));

    if methods.is_empty() {
        default_methods()
    } else {
        methods
    }
}

/// Resolves schema information from the handler's accessor, if any.
pub fn resolve_schema(accessor: Option<&SchemaAccessor>) -> Option<SchemaInfo> {
    match accessor? {
        SchemaAccessor::Dynamic { .. } => Some(SchemaInfo {
            schema_name: None,
            fields: Vec::new(),
            is_dynamic: true,
            outcome: SchemaOutcome::Complete,
        }),
        SchemaAccessor::Concrete(declaration) => {
            let (fields, outcome) = match instantiate(declaration) {
                Ok(fields) => (fields, SchemaOutcome::Complete),
                Err(e) => {
                    tracing::debug!(schema = %declaration.name, error = %e, "Schema instantiation failed");
                    (Vec::new(), SchemaOutcome::Partial { reason: e.to_string() })
                }
            };
            Some(SchemaInfo {
                schema_name: Some(declaration.name.clone()),
                fields,
                is_dynamic: false,
                outcome,
            })
        }
    }
}

/// Materializes a declared schema into its field list.
pub fn instantiate(declaration: &SchemaDeclaration) -> Result<Vec<SchemaField>, SchemaError> {
    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(declaration.fields.len());

    for field in &declaration.fields {
        if field.name.is_empty() {
            return Err(SchemaError::UnnamedField {
                schema: declaration.name.clone(),
            });
        }
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::DuplicateField {
                schema: declaration.name.clone(),
                field: field.name.clone(),
            });
        }
        if field.read_only && field.write_only {
            return Err(SchemaError::ConflictingAccess {
                schema: declaration.name.clone(),
                field: field.name.clone(),
            });
        }
        fields.push(SchemaField {
            name: field.name.clone(),
            field_type: if field.field_type.is_empty() {
                "string".to_string()
            } else {
                field.field_type.clone()
            },
            required: field.required,
            read_only: field.read_only,
            write_only: field.write_only,
            help_text: field.help_text.clone(),
            choices: field.choices.clone(),
        });
    }

    Ok(fields)
}
