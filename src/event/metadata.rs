//! Typed event metadata.
//!
//! Metadata is an open map, but the translator reads a few well-known keys
//! and needs them in a specific shape. Values are tagged so every coercion is
//! an explicit function that either converts or names the mismatch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, HEADERS_FORMAT_EXAMPLE};

/// Metadata key selecting the target partition (integer-like).
pub const META_PARTITION: &str = "partition";
/// Metadata key carrying the message key (string).
pub const META_KEY: &str = "key";
/// Metadata key carrying message headers (`k:v,k:v` string or pairs).
pub const META_HEADERS: &str = "headers";

/// A single metadata value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Pairs(Vec<(String, String)>),
}

impl MetaValue {
    /// Short name of the value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            MetaValue::Bool(_) => "bool",
            MetaValue::Int(_) => "integer",
            MetaValue::Float(_) => "float",
            MetaValue::Str(_) => "string",
            MetaValue::Pairs(_) => "pairs",
        }
    }

    /// Coerce to a 32-bit integer. Only integers are accepted.
    pub fn as_i32(&self, key: &str) -> Result<i32, MappingError> {
        match self {
            MetaValue::Int(v) => i32::try_from(*v).map_err(|_| MappingError::OutOfRange {
                key: key.to_string(),
                value: *v,
                target: "i32",
            }),
            other => Err(mismatch(key, "integer", other)),
        }
    }

    /// Coerce to a string slice. Only strings are accepted.
    pub fn as_str(&self, key: &str) -> Result<&str, MappingError> {
        match self {
            MetaValue::Str(s) => Ok(s),
            other => Err(mismatch(key, "string", other)),
        }
    }

    /// Coerce to ordered `(key, value)` pairs.
    ///
    /// Strings are parsed as `k:v,k:v`; pair sequences are taken as they are.
    /// Either way every pair needs a non-empty key and value.
    pub fn as_pairs(&self, key: &str) -> Result<Vec<(String, String)>, MappingError> {
        match self {
            MetaValue::Str(raw) => parse_pairs(key, raw),
            MetaValue::Pairs(pairs) => pairs
                .iter()
                .map(|(k, v)| {
                    if k.is_empty() || v.is_empty() {
                        Err(format_error(key, format!("{k}:{v}")))
                    } else {
                        Ok((k.clone(), v.clone()))
                    }
                })
                .collect(),
            other => Err(mismatch(key, "string", other)),
        }
    }
}

fn mismatch(key: &str, expected: &'static str, found: &MetaValue) -> MappingError {
    MappingError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

fn format_error(key: &str, entry: String) -> MappingError {
    MappingError::Format {
        key: key.to_string(),
        entry,
        example: HEADERS_FORMAT_EXAMPLE,
    }
}

/// Parse `k:v,k:v`. Empty segments are skipped, so `","` yields no pairs.
fn parse_pairs(key: &str, raw: &str) -> Result<Vec<(String, String)>, MappingError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((k, v)) if !k.trim().is_empty() && !v.trim().is_empty() => {
                Ok((k.trim().to_string(), v.trim().to_string()))
            }
            _ => Err(format_error(key, entry.to_string())),
        })
        .collect()
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

impl From<i32> for MetaValue {
    fn from(v: i32) -> Self {
        MetaValue::Int(v.into())
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<u32> for MetaValue {
    fn from(v: u32) -> Self {
        MetaValue::Int(v.into())
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Float(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Str(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Str(v)
    }
}

impl From<Vec<(String, String)>> for MetaValue {
    fn from(v: Vec<(String, String)>) -> Self {
        MetaValue::Pairs(v)
    }
}

/// Event metadata: unique string keys mapped to typed values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetaValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<MetaValue>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
