// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Registry access - the host device registry behind a narrow trait
//!
//! The engine never talks to the native registry API directly. Everything it
//! needs is exact-name lookup, broad enumeration by class name, and snapshot
//! reads of a service's property tree.

mod memory;
mod sysfs;

pub use memory::MemoryRegistry;
pub use sysfs::SysfsRegistry;

use std::fmt;

use crate::error::Result;

/// Native status reported when a read targets a released or unknown handle
pub const STATUS_BAD_ARGUMENT: i32 = 0xe000_02c2_u32 as i32;

/// Exclusively-owned reference to a located registry service
///
/// Handles are not `Clone`: exactly one owner holds a live handle, and it is
/// given back to its registry through [`DeviceRegistry::release`].
#[derive(Debug, PartialEq, Eq)]
pub struct DeviceHandle {
    id: u64,
    class_name: String,
    released: bool,
}

impl DeviceHandle {
    /// Create a live handle. Called by registry backends.
    pub fn new(id: u64, class_name: &str) -> Self {
        Self {
            id,
            class_name: class_name.to_string(),
            released: false,
        }
    }

    /// Backend-assigned identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Class name the service was registered under
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Whether the handle was given back
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Mark the handle released. Returns `false` if it already was.
    pub fn mark_released(&mut self) -> bool {
        !std::mem::replace(&mut self.released, true)
    }
}

/// One value in a service's property tree
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Boolean
    Bool(bool),
    /// Signed integer
    Integer(i64),
    /// Floating point
    Float(f64),
    /// Text
    String(String),
    /// Raw bytes
    Data(Vec<u8>),
    /// Ordered list, never searched
    Array(Vec<PropertyValue>),
    /// Nested mapping
    Tree(PropertyTree),
}

impl PropertyValue {
    /// Nested mapping, if this value is one
    pub fn as_tree(&self) -> Option<&PropertyTree> {
        match self {
            PropertyValue::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    /// Convert a JSON value. `null` has no registry counterpart and is rejected.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        use serde_json::Value;

        Ok(match value {
            Value::Null => {
                return Err(crate::Error::Snapshot("null is not a property value".to_string()))
            }
            Value::Bool(b) => PropertyValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PropertyValue::Integer(i),
                None => PropertyValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => PropertyValue::String(s),
            Value::Array(items) => PropertyValue::Array(
                items
                    .into_iter()
                    .map(PropertyValue::from_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(map) => PropertyValue::Tree(PropertyTree::from_json(map)?),
        })
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::String(s) => write!(f, "{}", s),
            PropertyValue::Data(bytes) => {
                write!(f, "<")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                write!(f, ">")
            }
            PropertyValue::Array(items) => write!(f, "[{} items]", items.len()),
            PropertyValue::Tree(tree) => write!(f, "{{{} keys}}", tree.len()),
        }
    }
}

/// Read-only nested key/value snapshot of a service's properties
///
/// Keys keep the order the registry reported them in; searches walk that
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyTree {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyTree {
    /// Empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: PropertyValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a key, keeping the original position on replace
    pub fn insert(&mut self, key: &str, value: PropertyValue) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Value under `key`
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Entries in registry order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of top-level keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree has no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert a JSON object, preserving key order
    pub fn from_json(map: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let mut tree = PropertyTree::new();
        for (key, value) in map {
            let value = PropertyValue::from_json(value)
                .map_err(|e| crate::Error::Snapshot(format!("{}: {}", key, e)))?;
            tree.insert(&key, value);
        }
        Ok(tree)
    }

    pub(crate) fn entries(&self) -> &[(String, PropertyValue)] {
        &self.entries
    }
}

impl FromIterator<(String, PropertyValue)> for PropertyTree {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        let mut tree = PropertyTree::new();
        for (key, value) in iter {
            tree.insert(&key, value);
        }
        tree
    }
}

/// Host device registry capability
///
/// Calls are synchronous and treated as bounded. "Not found" is a normal
/// outcome, never an error.
pub trait DeviceRegistry: Send + Sync {
    /// First service whose class name matches exactly
    fn find_service(&self, name: &str) -> Option<DeviceHandle>;

    /// All services matching `name`, produced lazily. Call again to restart.
    fn enumerate_services<'a>(&'a self, name: &'a str)
        -> Box<dyn Iterator<Item = DeviceHandle> + 'a>;

    /// Snapshot read of a service's property tree
    fn read_properties(&self, handle: &DeviceHandle) -> Result<PropertyTree>;

    /// Give a handle back. Releasing an already-released handle is a no-op.
    fn release(&self, handle: &mut DeviceHandle);

    /// Like [`find_service`](Self::find_service), for callers that need the service
    fn require_service(&self, name: &str) -> Result<DeviceHandle> {
        self.find_service(name)
            .ok_or_else(|| crate::Error::ServiceNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_release_is_idempotent() {
        let mut handle = DeviceHandle::new(7, "AppleSPUHIDInterface");
        assert!(!handle.is_released());
        assert!(handle.mark_released());
        assert!(!handle.mark_released());
        assert!(handle.is_released());
    }

    #[test]
    fn test_tree_insert_keeps_position() {
        let mut tree = PropertyTree::new()
            .with("b", PropertyValue::Integer(1))
            .with("a", PropertyValue::Integer(2));
        tree.insert("b", PropertyValue::Integer(3));

        let keys: Vec<&str> = tree.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(tree.get("b"), Some(&PropertyValue::Integer(3)));
    }

    #[test]
    fn test_tree_from_json_preserves_order() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{"zeta": 1, "alpha": {"inner": [1.5, "x"]}, "mid": true}"#,
        )
        .unwrap();
        let map = match json {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let tree = PropertyTree::from_json(map).unwrap();

        let keys: Vec<&str> = tree.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);

        let alpha = tree.get("alpha").and_then(PropertyValue::as_tree).unwrap();
        assert_eq!(
            alpha.get("inner"),
            Some(&PropertyValue::Array(vec![
                PropertyValue::Float(1.5),
                PropertyValue::String("x".to_string()),
            ]))
        );
    }

    #[test]
    fn test_null_rejected() {
        let mut map = serde_json::Map::new();
        map.insert("bad".to_string(), serde_json::Value::Null);
        assert!(PropertyTree::from_json(map).is_err());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(PropertyValue::Data(vec![0xde, 0xad]).to_string(), "<dead>");
        assert_eq!(
            PropertyValue::Array(vec![PropertyValue::Bool(true)]).to_string(),
            "[1 items]"
        );
    }
}
