use crate::errors::{FlagError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attributes describing the caller (user, request, environment) that rules
/// are tested against. Empty by default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    attributes: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object; any other value is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(attributes) => Ok(Self { attributes }),
            Value::Null => Ok(Self::default()),
            other => Err(FlagError::InvalidContext(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Resolve a dotted path such as `user.roles.0`. A top-level attribute
    /// whose name contains dots wins over nested traversal.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if let Some(v) = self.attributes.get(path) {
            return Some(v);
        }
        let mut parts = path.split('.');
        let mut node = self.attributes.get(parts.next()?)?;
        for part in parts {
            node = match node {
                Value::Object(m) => m.get(part)?,
                Value::Array(a) => a.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(node)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl From<Map<String, Value>> for Context {
    fn from(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }
}

impl TryFrom<Value> for Context {
    type Error = FlagError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
