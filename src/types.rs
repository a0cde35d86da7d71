//! Shared types used across pipeline stages.
//!
//! Directory metadata files and page metadata comments are both YAML
//! mappings. They are stored as [`Metadata`], a JSON-shaped map, so the
//! template engine, the resolver chain, and the site configuration all speak
//! the same value model.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("expected a key-value mapping, found {0}")]
    NotAMapping(&'static str),
}

/// A key-value mapping parsed from a directory metadata file or a page
/// metadata comment. Keys are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Parse a YAML document. An empty or `null` document is an empty mapping;
    /// anything else that is not a mapping is rejected.
    pub fn from_yaml(content: &str) -> Result<Self, MetadataError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_yaml::from_str(content)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, MetadataError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(MetadataError::NotAMapping(kind_name(&other))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of a top-level key. Non-string scalars are not coerced.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Follow a slash-delimited path (`/site/baseurl`, `extra/authors/0`) through
/// nested mappings and lists. Empty segments are ignored, so the leading
/// slash is optional and `/` addresses the root itself.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .try_fold(root, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
