//! Attribute tables carried alongside vector geometries

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// Named attributes of a single feature
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Side-table of extra attributes keyed by feature id.
///
/// Geometry-producing stages fill it and downstream stages pass it through
/// unchanged, so attributes a caller attached to a polygon survive
/// classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeTable {
    rows: BTreeMap<String, Attributes>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one attribute of feature `id`
    pub fn set(&mut self, id: &str, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.rows
            .entry(id.to_string())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Get one attribute of feature `id`
    pub fn get(&self, id: &str, key: &str) -> Option<&AttributeValue> {
        self.rows.get(id).and_then(|attrs| attrs.get(key))
    }

    /// All attributes of feature `id`
    pub fn attributes(&self, id: &str) -> Option<&Attributes> {
        self.rows.get(id)
    }

    /// Keep only rows whose id satisfies `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.rows.retain(|id, _| keep(id));
    }

    /// Number of features with attributes
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attributes)> {
        self.rows.iter().map(|(id, attrs)| (id.as_str(), attrs))
    }
}
