//! Coordinator stream messages.
//!
//! A record's identity travels in its key: the UTF-8 JSON of
//! `{version, type, key}`, serialized from a sorted map so that two
//! producers populating the fields in any order emit byte-identical key
//! bytes (the log is compacted by key, so equal identities must collide).
//! Provenance (source, username, timestamp) travels in the value next to
//! the `values` payload; absent value bytes mark a delete.

use crate::error::{Error, Result};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Wire format version
pub const VERSION: i64 = 1;

/// Record type carrying one configuration entry
pub const SET_CONFIG_TYPE: &str = "set-config";

const VERSION_FIELD: &str = "version";
const TYPE_FIELD: &str = "type";
const KEY_FIELD: &str = "key";
const SOURCE_FIELD: &str = "source";
const USERNAME_FIELD: &str = "username";
const TIMESTAMP_FIELD: &str = "timestamp";
const VALUES_FIELD: &str = "values";
const VALUE_FIELD: &str = "value";

/// One record in the coordinator log.
#[derive(Debug, Clone)]
pub struct CoordinatorMessage {
    key: BTreeMap<String, Value>,
    value: Option<Map<String, Value>>,
}

impl CoordinatorMessage {
    /// Create a message of the given type with an empty values payload
    pub fn new(message_type: &str, key: &str, source: &str) -> Self {
        let mut key_map = BTreeMap::new();
        key_map.insert(VERSION_FIELD.to_string(), Value::from(VERSION));
        key_map.insert(TYPE_FIELD.to_string(), Value::from(message_type));
        key_map.insert(KEY_FIELD.to_string(), Value::from(key));

        let mut value_map = Map::new();
        value_map.insert(SOURCE_FIELD.to_string(), Value::from(source));
        value_map.insert(USERNAME_FIELD.to_string(), Value::from(username()));
        value_map.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::from(Utc::now().timestamp_millis()),
        );
        value_map.insert(VALUES_FIELD.to_string(), Value::Object(Map::new()));

        Self {
            key: key_map,
            value: Some(value_map),
        }
    }

    /// A `set-config` record assigning `value` to the configuration key
    pub fn set_config(source: &str, key: &str, value: &str) -> Self {
        let mut message = Self::new(SET_CONFIG_TYPE, key, source);
        message.insert_value(VALUE_FIELD, Value::from(value));
        message
    }

    /// A delete record for the given key and record type
    pub fn delete(source: &str, key: &str, message_type: &str) -> Self {
        let mut message = Self::new(message_type, key, source);
        message.value = None;
        message
    }

    /// Decode a message from its wire bytes. `value_bytes` of `None`
    /// signifies a delete.
    pub fn from_wire(key_bytes: &[u8], value_bytes: Option<&[u8]>) -> Result<Self> {
        let key: BTreeMap<String, Value> = serde_json::from_slice(key_bytes)
            .map_err(|e| Error::MalformedRecord(format!("undecodable key bytes: {e}")))?;
        let value = value_bytes
            .map(|bytes| {
                serde_json::from_slice::<Map<String, Value>>(bytes)
                    .map_err(|e| Error::MalformedRecord(format!("undecodable value bytes: {e}")))
            })
            .transpose()?;
        Ok(Self { key, value })
    }

    /// Canonical key bytes: sorted-field UTF-8 JSON
    pub fn key_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.key)?)
    }

    /// Value bytes, or `None` for a delete
    pub fn value_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.value
            .as_ref()
            .map(|value| serde_json::to_vec(value).map_err(Error::from))
            .transpose()
    }

    pub fn version(&self) -> i64 {
        self.key
            .get(VERSION_FIELD)
            .and_then(Value::as_i64)
            .unwrap_or_default()
    }

    pub fn message_type(&self) -> &str {
        self.key
            .get(TYPE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// The configuration key this record addresses
    pub fn key(&self) -> &str {
        self.key
            .get(KEY_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn source(&self) -> Option<&str> {
        self.value_field(SOURCE_FIELD).and_then(Value::as_str)
    }

    pub fn username(&self) -> Option<&str> {
        self.value_field(USERNAME_FIELD).and_then(Value::as_str)
    }

    /// Epoch milliseconds at which the producer created the record
    pub fn timestamp(&self) -> Option<i64> {
        self.value_field(TIMESTAMP_FIELD).and_then(Value::as_i64)
    }

    /// A record with no value is a delete
    pub fn is_delete(&self) -> bool {
        self.value.is_none()
    }

    /// The configuration value of a `set-config` record
    pub fn config_value(&self) -> Option<&str> {
        self.values().and_then(|values| {
            values.get(VALUE_FIELD).and_then(Value::as_str)
        })
    }

    fn values(&self) -> Option<&Map<String, Value>> {
        self.value_field(VALUES_FIELD).and_then(Value::as_object)
    }

    fn value_field(&self, field: &str) -> Option<&Value> {
        self.value.as_ref().and_then(|value| value.get(field))
    }

    fn insert_value(&mut self, field: &str, value: Value) {
        if let Some(Value::Object(values)) = self
            .value
            .as_mut()
            .and_then(|value| value.get_mut(VALUES_FIELD))
        {
            values.insert(field.to_string(), value);
        }
    }
}

/// Messages are equal when they address the same key with the same
/// payload; provenance (source, username, timestamp) is excluded so
/// replayed duplicates compare equal.
impl PartialEq for CoordinatorMessage {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.values() == other.values() && self.is_delete() == other.is_delete()
    }
}

impl Eq for CoordinatorMessage {}

fn username() -> String {
    std::env::var("USER").unwrap_or_default()
}
