//! Request envelope
//!
//! ```json
//! {
//!   "filter": {"name": "John", "age": {"gte": 18}},
//!   "data": {"status": "active", "set": {"profile.city": "Oslo"}, "unset": ["nickname"]},
//!   "binary64": "aGVsbG8="
//! }
//! ```

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::errors::FieldDetail;

use super::binary::BinaryPayload;
use super::filter::{check_flat_value, is_field_path, Filter};

/// Reserved top-level keys of a request envelope
pub const REQUEST_KEYS: [&str; 4] = ["filter", "data", "binary64", "binary64gz"];

/// Partial-update keys inside `data`
pub const DATA_SET: &str = "set";
pub const DATA_UNSET: &str = "unset";

/// The `data` section of a request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSection {
    /// Plain flat fields
    pub fields: BTreeMap<String, Value>,
    /// Field path to new value
    pub set: Option<BTreeMap<String, Value>>,
    /// Field paths to remove
    pub unset: Option<Vec<String>>,
}

impl DataSection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.set
            .get_or_insert_with(BTreeMap::new)
            .insert(path.into(), value);
        self
    }

    pub fn unset(mut self, path: impl Into<String>) -> Self {
        self.unset.get_or_insert_with(Vec::new).push(path.into());
        self
    }

    /// True when the section only describes a partial update
    pub fn is_partial_update(&self) -> bool {
        self.fields.is_empty() && (self.set.is_some() || self.unset.is_some())
    }

    pub fn to_value(&self) -> Value {
        let mut map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(set) = &self.set {
            map.insert(
                DATA_SET.to_string(),
                Value::Object(set.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            );
        }
        if let Some(unset) = &self.unset {
            map.insert(
                DATA_UNSET.to_string(),
                Value::Array(unset.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(map)
    }

    /// Parse the `data` object, collecting every flatness violation
    pub(crate) fn parse(map: &Map<String, Value>, violations: &mut Vec<FieldDetail>) -> Self {
        let mut section = DataSection::default();

        for (key, value) in map {
            let path = format!("data.{}", key);
            match key.as_str() {
                DATA_SET => match value {
                    Value::Object(entries) => {
                        let mut set = BTreeMap::new();
                        for (field, v) in entries {
                            let field_path = format!("{}.{}", path, field);
                            if !is_field_path(field) {
                                violations.push(FieldDetail::new(field_path, "invalid field path"));
                            } else if check_flat_value(&field_path, v, violations) {
                                set.insert(field.clone(), v.clone());
                            }
                        }
                        section.set = Some(set);
                    }
                    _ => violations.push(FieldDetail::new(path, "'set' must be an object")),
                },
                DATA_UNSET => match value {
                    Value::Array(items) => {
                        let mut unset = Vec::with_capacity(items.len());
                        for (i, item) in items.iter().enumerate() {
                            match item.as_str() {
                                Some(field) if is_field_path(field) => {
                                    unset.push(field.to_string())
                                }
                                _ => violations.push(FieldDetail::new(
                                    format!("{}[{}]", path, i),
                                    "'unset' entries must be field paths",
                                )),
                            }
                        }
                        section.unset = Some(unset);
                    }
                    _ => violations.push(FieldDetail::new(path, "'unset' must be an array")),
                },
                _ => {
                    if check_flat_value(&path, value, violations) {
                        section.fields.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        section
    }
}

impl Serialize for DataSection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// A decoded request envelope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestEnvelope {
    pub filter: Option<Filter>,
    pub data: Option<DataSection>,
    pub binary: Option<BinaryPayload>,
}

impl RequestEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_data(mut self, data: DataSection) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_binary(mut self, binary: BinaryPayload) -> Self {
        self.binary = Some(binary);
        self
    }
}

impl Serialize for RequestEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = [self.filter.is_some(), self.data.is_some(), self.binary.is_some()]
            .iter()
            .filter(|present| **present)
            .count();
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(filter) = &self.filter {
            map.serialize_entry("filter", filter)?;
        }
        if let Some(data) = &self.data {
            map.serialize_entry("data", data)?;
        }
        if let Some(binary) = &self.binary {
            map.serialize_entry(binary.key(), binary.encoded())?;
        }
        map.end()
    }
}
