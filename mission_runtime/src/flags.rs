//! Durable key/value storage owned by the host and persisted with saves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FlagValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FlagValue::Bool(_) => "bool",
            FlagValue::Int(_) => "int",
            FlagValue::Text(_) => "text",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FlagValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FlagValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        FlagValue::Int(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::Text(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        FlagValue::Text(value)
    }
}

#[derive(Debug, Error)]
pub enum FlagStoreError {
    #[error("flag '{0}' is not set")]
    KeyNotFound(String),
    #[error("flag '{key}' holds a {found} value, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("failed to encode flag store: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode flag store: {0}")]
    Decode(#[source] bincode::Error),
}

/// String-keyed store with explicit typed accessors.
///
/// Keys are composite strings such as `quest_started_<id>`; each logical flag
/// owns exactly one key so modules never contend over an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagStore {
    values: BTreeMap<String, FlagValue>,
}

impl FlagStore {
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the stored value or [`FlagStoreError::KeyNotFound`].
    pub fn get(&self, key: &str) -> Result<&FlagValue, FlagStoreError> {
        self.values
            .get(key)
            .ok_or_else(|| FlagStoreError::KeyNotFound(key.to_string()))
    }

    pub fn get_or(&self, key: &str, default: FlagValue) -> FlagValue {
        self.values.get(key).cloned().unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, FlagStoreError> {
        let value = self.get(key)?;
        value.as_bool().ok_or(FlagStoreError::TypeMismatch {
            key: key.to_string(),
            expected: "bool",
            found: value.type_name(),
        })
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(FlagValue::as_bool)
            .unwrap_or(default)
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.values
            .get(key)
            .and_then(FlagValue::as_int)
            .unwrap_or(default)
    }

    /// Stores `value` under `key`, returning the previous value if any.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FlagValue>) -> Option<FlagValue> {
        self.values.insert(key.into(), value.into())
    }

    pub fn clear(&mut self, key: &str) -> Option<FlagValue> {
        self.values.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encodes the store for embedding in a host save file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FlagStoreError> {
        bincode::serialize(self).map_err(FlagStoreError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FlagStoreError> {
        bincode::deserialize(bytes).map_err(FlagStoreError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_without_default_is_an_error() {
        let store = FlagStore::new();
        let err = store.get("quest_started_survey").expect_err("key is unset");
        assert!(matches!(err, FlagStoreError::KeyNotFound(ref key) if key == "quest_started_survey"));
    }

    #[test]
    fn get_or_uses_caller_default() {
        let mut store = FlagStore::new();
        assert_eq!(store.get_or("seen_intro", FlagValue::Bool(false)), FlagValue::Bool(false));
        store.set("seen_intro", true);
        assert_eq!(store.get_or("seen_intro", FlagValue::Bool(false)), FlagValue::Bool(true));
    }

    #[test]
    fn typed_getter_reports_mismatch() {
        let mut store = FlagStore::new();
        store.set("quests_active", 2i64);
        let err = store.get_bool("quests_active").expect_err("value is an int");
        assert!(matches!(
            err,
            FlagStoreError::TypeMismatch {
                expected: "bool",
                found: "int",
                ..
            }
        ));
        assert_eq!(store.get_int_or("quests_active", 0), 2);
    }

    #[test]
    fn clear_removes_value() {
        let mut store = FlagStore::new();
        store.set("a", "x");
        assert_eq!(store.clear("a"), Some(FlagValue::Text("x".to_string())));
        assert!(!store.has("a"));
        assert!(store.is_empty());
    }

    #[test]
    fn store_survives_save_encoding() {
        let mut store = FlagStore::new();
        store.set("quest_started_deliver_food", true);
        store.set("quests_active", 1i64);
        store.set("leader", "vattori");
        let bytes = store.to_bytes().expect("store should encode");
        let restored = FlagStore::from_bytes(&bytes).expect("store should decode");
        assert_eq!(restored, store);
    }
}
