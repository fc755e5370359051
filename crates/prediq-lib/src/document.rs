//! The document model: an attribute-keyed map evaluated predicates run
//! against.
//!
//! Documents usually arrive as JSON; [`Document::from_json_str`] and the
//! `From<serde_json::Value>` impl convert into the engine's value domain.

use indexmap::IndexMap;

use crate::value::Value;

/// A mapping from identifier name to value, supplied at evaluation time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document(IndexMap<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Dotted-path lookup: `a.b.c` walks nested objects. Any missing key or
    /// non-object interior yields `None`.
    pub fn lookup_path(&self, name: &str) -> Option<&Value> {
        let mut parts = name.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            match current {
                Value::Object(map) => current = map.get(part)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Parses a JSON object into a document. Non-object JSON is an error.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        match value {
            serde_json::Value::Object(_) => Ok(Self::from(value)),
            other => Err(serde::de::Error::custom(format!(
                "document must be a JSON object, got {other}"
            ))),
        }
    }
}

impl From<serde_json::Value> for Document {
    fn from(json: serde_json::Value) -> Self {
        match Value::from(json) {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
