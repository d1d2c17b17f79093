//! Metadata records, the original-metadata reader, and the merge/redaction policy.
//!
//! - [`MetadataRecord`]: ordered, case-sensitive string key/value pairs
//! - [`read_original`]: collect existing metadata from a source image file
//! - [`resolve`]: merge original and user metadata, gate the payload, redact

mod policy;
mod reader;

pub use policy::{ResolvedMetadata, TrustFlag, resolve};
pub use reader::{read_original, read_original_bytes};

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::{InjectError, Result};

/// Ordered mapping from string key to string value.
///
/// Keys are case-sensitive. Iteration follows insertion order; overwriting an
/// existing key keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    entries: Vec<(String, String)>,
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse user-supplied metadata from a JSON object string.
    ///
    /// An empty or whitespace-only string is an empty record. Anything else
    /// must be a JSON object; strings are taken verbatim, numbers and
    /// booleans use their JSON text, arrays and objects are stored as compact
    /// JSON, and `null` entries are dropped.
    ///
    /// ```rust
    /// use image_stamp::metadata::MetadataRecord;
    ///
    /// let record = MetadataRecord::from_json(r#"{"Title":"T","Rating":5}"#).unwrap();
    /// assert_eq!(record.get("Rating"), Some("5"));
    /// assert!(MetadataRecord::from_json("{bad json").is_err());
    /// ```
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }

        let value: Value =
            serde_json::from_str(raw).map_err(|e| InjectError::InvalidUserMetadataJson {
                reason: e.to_string(),
            })?;
        let Value::Object(map) = value else {
            return Err(InjectError::InvalidUserMetadataJson {
                reason: "expected a JSON object".to_string(),
            });
        };

        let mut record = Self::new();
        for (key, value) in map {
            let text = match value {
                Value::Null => continue,
                Value::String(s) => s,
                other => other.to_string(),
            };
            record.insert(key, text);
        }
        Ok(record)
    }

    /// Insert or overwrite a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = (&str, &mut String)> {
        self.entries
            .iter_mut()
            .map(|&mut (ref k, ref mut v)| (k.as_str(), v))
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.entries.retain(|(k, v)| keep(k, v));
    }

    /// `key:value` lines joined by `\n`, in insertion order.
    ///
    /// Line breaks inside a key or value are folded to spaces so one entry
    /// is always exactly one line.
    pub fn flatten_lines(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}:{}", single_line(k), single_line(v)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for MetadataRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
