//! # Registry Layer
//!
//! The registry is a remote key-path store holding recipe, version, publish-key and
//! user records. This module defines the store contract and its building blocks:
//!
//! - **`RegistryStore`**: `get/set/update/remove/exists` over `/`-separated paths,
//!   with atomic multi-path `update`.
//! - **`memory`**: an in-process JSON tree, used by tests and as the core of `file`.
//! - **`file`**: the same tree persisted to a single JSON file (offline registry).
//! - **`http`**: a REST key-path client (`GET/PUT/PATCH/DELETE <path>.json`).
//! - **`entity`**: `EntityManager<T>`, the typed, cached repository over a store.
//! - **`paths`**: the canonical record paths.
//! - **`publication`**: registry-side acceptance of an uploaded package.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod entity;
pub mod file;
pub mod http;
pub mod memory;
pub mod paths;
pub mod publication;

/// Errors raised by registry stores.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A path is empty or contains a forbidden character.
    #[error("Invalid registry path '{path}': {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// A record does not have the expected shape.
    #[error("Registry record at '{path}' has an unexpected shape: {source}")]
    Schema {
        /// Where the record lives.
        path: String,
        /// The decoding error.
        #[source]
        source: serde_json::Error,
    },
    /// The backing file could not be read or written.
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    /// The backing document could not be (de)serialized.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    /// The remote registry could not be reached.
    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),
    /// The remote registry answered with an error status.
    #[error("Registry request to '{path}' failed with status {status}.")]
    Status {
        /// The path that was requested.
        path: String,
        /// The HTTP status code.
        status: u16,
    },
}

/// Shorthand for registry results.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// The value found at a path, or nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    path: String,
    value: Option<Value>,
}

impl Snapshot {
    /// Wraps a raw value; `null` is treated as "does not exist".
    pub fn new(path: impl Into<String>, value: Option<Value>) -> Self {
        let value = value.filter(|v| !v.is_null());
        Self {
            path: path.into(),
            value,
        }
    }

    /// The path this snapshot was read from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `true` if a value is stored at the path.
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    /// The raw value, if any.
    pub fn val(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Consumes the snapshot, returning the raw value.
    pub fn into_val(self) -> Option<Value> {
        self.value
    }

    /// Decodes the value into a typed record, failing on shape mismatch.
    pub fn decode<T: DeserializeOwned>(&self) -> RegistryResult<Option<T>> {
        match &self.value {
            None => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|source| RegistryError::Schema {
                    path: self.path.clone(),
                    source,
                }),
        }
    }
}

/// The key-path store contract.
///
/// Paths are `/`-separated and relative to the registry root. Writing `null` with
/// `set` or `update` deletes the value at that path.
#[async_trait]
pub trait RegistryStore: Send + Sync + std::fmt::Debug {
    /// Reads the value at `path`.
    async fn get(&self, path: &str) -> RegistryResult<Snapshot>;

    /// Replaces the value at `path`.
    async fn set(&self, path: &str, value: Value) -> RegistryResult<()>;

    /// Writes several paths at once. Either every write is applied or none is.
    async fn update(&self, values: BTreeMap<String, Value>) -> RegistryResult<()>;

    /// Deletes the value at `path` (and everything under it).
    async fn remove(&self, path: &str) -> RegistryResult<()>;

    /// `true` if a value is stored at `path`.
    async fn exists(&self, path: &str) -> RegistryResult<bool> {
        Ok(self.get(path).await?.exists())
    }
}

/// Splits and validates a registry path.
pub fn split_path(path: &str) -> RegistryResult<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let segments: Vec<&str> = trimmed.split('/').collect();
    for segment in &segments {
        if segment.is_empty() {
            return Err(RegistryError::InvalidPath {
                path: path.to_string(),
                reason: "empty segment",
            });
        }
        if segment.contains(['.', '#', '$', '[', ']']) {
            return Err(RegistryError::InvalidPath {
                path: path.to_string(),
                reason: "segments may not contain '.', '#', '$', '[' or ']'",
            });
        }
    }
    Ok(segments)
}

/// Percent-encodes the characters a path segment may not contain.
///
/// The encoding is lossless, so version numbers (`1.2.3` → `1%2E2%2E3`) and
/// e-mail addresses can be used as keys.
pub fn escape_key(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '.' => escaped.push_str("%2E"),
            '#' => escaped.push_str("%23"),
            '$' => escaped.push_str("%24"),
            '[' => escaped.push_str("%5B"),
            ']' => escaped.push_str("%5D"),
            '/' => escaped.push_str("%2F"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Reverses [`escape_key`].
pub fn unescape_key(escaped: &str) -> String {
    let mut raw = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(pos) = rest.find('%') {
        let (head, tail) = rest.split_at(pos);
        raw.push_str(head);
        let decoded = match tail.get(..3) {
            Some("%25") => Some('%'),
            Some("%2E") => Some('.'),
            Some("%23") => Some('#'),
            Some("%24") => Some('$'),
            Some("%5B") => Some('['),
            Some("%5D") => Some(']'),
            Some("%2F") => Some('/'),
            _ => None,
        };
        match decoded {
            Some(c) => {
                raw.push(c);
                rest = tail.get(3..).unwrap_or_default();
            }
            None => {
                raw.push('%');
                rest = tail.get(1..).unwrap_or_default();
            }
        }
    }
    raw.push_str(rest);
    raw
}
