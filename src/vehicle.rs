//! Vehicle snapshot as returned by the telematics service.
//!
//! A [`Vehicle`] is an immutable snapshot taken once per synchronization
//! cycle. It is never merged with an earlier snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Last known position reported by the vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Epoch milliseconds (UTC) at which the position was recorded.
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub vin: String,
    pub nickname: Option<String>,
    pub make: String,
    pub model_description: String,
    pub location: Location,
    pub attributes: Attributes,
}

impl Vehicle {
    /// Name shown in Home Assistant, falls back to "Car".
    pub fn display_name(&self) -> &str {
        match self.nickname.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "Car",
        }
    }
}

/// Ordered flat mapping of attribute name to string value.
///
/// Numeric readings come in pairs: `<Name>_value` holds the reading and
/// `<Name>_unit` holds its unit marker (`km`, `volts`, `null`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, keeping its position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compact a nested JSON document into flat `_`-joined keys.
    ///
    /// Arrays are indexed by position and JSON `null` becomes the string
    /// `"null"`, which is how the API reports readings without a unit.
    pub fn flatten(document: &Value) -> Self {
        let mut attributes = Self::new();
        flatten_into(&mut attributes, None, document);
        attributes
    }
}

fn flatten_into(out: &mut Attributes, prefix: Option<&str>, value: &Value) {
    let join = |key: &str| match prefix {
        Some(p) => format!("{p}_{key}"),
        None => key.to_string(),
    };

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(out, Some(&join(key)), child);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(out, Some(&join(&index.to_string())), child);
            }
        }
        leaf => {
            // A scalar at the root has no name to file it under.
            let Some(key) = prefix else { return };
            let text = match leaf {
                Value::String(s) => s.clone(),
                Value::Null => "null".to_string(),
                other => other.to_string(),
            };
            out.insert(key, text);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Self::new();
        for (k, v) in iter {
            attributes.insert(k, v);
        }
        attributes
    }
}
