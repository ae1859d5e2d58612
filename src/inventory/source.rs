//! Route sources.
//!
//! # Responsibilities
//! - Supply the routing tree to inspect
//! - Keep a named registry so configuration can pick one source
//!
//! # Design Decisions
//! - File sources re-read the document on every load, so each request
//!   sees the current tree
//! - Document format is chosen by file extension (TOML or JSON)
//! - Documents are decoded entry by entry; see [`crate::inventory::document`]

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::inventory::document::{decode_document, DocumentFormat};
use crate::inventory::tree::RouteNode;

/// Name of the source inspected when none is configured.
pub const PRIMARY_SOURCE: &str = "primary";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("route source '{0}' is not registered")]
    UnknownSource(String),

    #[error("failed to read route document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse route document {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Anything that can hand over a routing tree.
pub trait RouteSource: Send + Sync {
    /// Returns the current top-level nodes.
    fn load(&self) -> Result<Vec<RouteNode>, SourceError>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

/// An in-process tree, typically built by a framework adapter.
#[derive(Debug, Clone, Default)]
pub struct StaticRouteSource {
    roots: Vec<RouteNode>,
}

impl StaticRouteSource {
    pub fn new(roots: Vec<RouteNode>) -> Self {
        Self { roots }
    }
}

impl RouteSource for StaticRouteSource {
    fn load(&self) -> Result<Vec<RouteNode>, SourceError> {
        Ok(self.roots.clone())
    }

    fn describe(&self) -> String {
        format!("static ({} top-level nodes)", self.roots.len())
    }
}

/// A route document on disk.
#[derive(Debug, Clone)]
pub struct FileRouteSource {
    path: PathBuf,
}

impl FileRouteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn format(&self) -> DocumentFormat {
        let is_json = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            DocumentFormat::Json
        } else {
            DocumentFormat::Toml
        }
    }
}

impl RouteSource for FileRouteSource {
    fn load(&self) -> Result<Vec<RouteNode>, SourceError> {
        let content = fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        decode_document(&content, self.format()).map_err(|message| SourceError::Parse {
            path: self.path.clone(),
            message,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Named route sources.
#[derive(Clone, Default)]
pub struct RouteSources {
    sources: BTreeMap<String, Arc<dyn RouteSource>>,
}

impl RouteSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, source: Arc<dyn RouteSource>) {
        self.sources.insert(name.into(), source);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn RouteSource>, SourceError> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::UnknownSource(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }
}

impl fmt::Debug for RouteSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.sources.keys()).finish()
    }
}
