// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! In-memory registry, built by hand or loaded from a JSON snapshot

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info};

use super::{DeviceHandle, DeviceRegistry, PropertyTree, STATUS_BAD_ARGUMENT};
use crate::error::{Error, Result};

struct MemoryService {
    class_name: String,
    /// Properties, or the native status a read reports
    properties: std::result::Result<PropertyTree, i32>,
}

/// Registry whose services live in memory
///
/// Tracks every handle it hands out so callers can check that handles are
/// released.
pub struct MemoryRegistry {
    services: Vec<MemoryService>,
    live: Mutex<HashMap<u64, usize>>,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    services: Vec<SnapshotService>,
}

#[derive(Debug, Deserialize)]
struct SnapshotService {
    class: String,
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    error: Option<i32>,
}

impl MemoryRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            live: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a service with readable properties
    pub fn with_service(mut self, class_name: &str, properties: PropertyTree) -> Self {
        self.services.push(MemoryService {
            class_name: class_name.to_string(),
            properties: Ok(properties),
        });
        self
    }

    /// Register a service whose property read fails with `code`
    pub fn with_failing_service(mut self, class_name: &str, code: i32) -> Self {
        self.services.push(MemoryService {
            class_name: class_name.to_string(),
            properties: Err(code),
        });
        self
    }

    /// Load a snapshot document:
    /// `{"services": [{"class": "...", "properties": {...}} | {"class": "...", "error": N}]}`
    pub fn from_snapshot(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let registry = Self::from_snapshot_str(&content)?;
        info!("Loaded registry snapshot from {:?} ({} services)", path, registry.len());
        Ok(registry)
    }

    /// Parse a snapshot document from a string
    pub fn from_snapshot_str(content: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(content)?;
        let mut registry = Self::new();

        for service in snapshot.services {
            registry = match (service.properties, service.error) {
                (_, Some(code)) => registry.with_failing_service(&service.class, code),
                (Some(map), None) => {
                    let tree = PropertyTree::from_json(map)?;
                    registry.with_service(&service.class, tree)
                }
                (None, None) => registry.with_service(&service.class, PropertyTree::new()),
            };
        }

        Ok(registry)
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether no services are registered
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Handles handed out and not yet released
    pub fn live_handles(&self) -> usize {
        self.live.lock().len()
    }

    fn issue(&self, index: usize) -> DeviceHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.lock().insert(id, index);
        DeviceHandle::new(id, &self.services[index].class_name)
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry for MemoryRegistry {
    fn find_service(&self, name: &str) -> Option<DeviceHandle> {
        let index = self.services.iter().position(|s| s.class_name == name)?;
        Some(self.issue(index))
    }

    fn enumerate_services<'a>(
        &'a self,
        name: &'a str,
    ) -> Box<dyn Iterator<Item = DeviceHandle> + 'a> {
        Box::new(
            self.services
                .iter()
                .enumerate()
                .filter(move |(_, s)| s.class_name == name)
                .map(move |(index, _)| self.issue(index)),
        )
    }

    fn read_properties(&self, handle: &DeviceHandle) -> Result<PropertyTree> {
        let index = self.live.lock().get(&handle.id()).copied();
        let service = match index {
            Some(index) if !handle.is_released() => &self.services[index],
            _ => {
                return Err(Error::PropertyRead {
                    service: handle.class_name().to_string(),
                    code: STATUS_BAD_ARGUMENT,
                })
            }
        };

        service.properties.clone().map_err(|code| Error::PropertyRead {
            service: service.class_name.clone(),
            code,
        })
    }

    fn release(&self, handle: &mut DeviceHandle) {
        if handle.mark_released() {
            self.live.lock().remove(&handle.id());
            debug!("Released handle {} ({})", handle.id(), handle.class_name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PropertyValue;

    fn registry() -> MemoryRegistry {
        MemoryRegistry::new()
            .with_service("IOHIDDevice", PropertyTree::new().with("Product", PropertyValue::String("Keyboard".into())))
            .with_failing_service("IOHIDDevice", 0x2c2)
            .with_service("AppleSMC", PropertyTree::new())
    }

    #[test]
    fn test_find_service_absent_is_none() {
        let registry = registry();
        assert!(registry.find_service("AppleSPUHIDInterface").is_none());
        assert_eq!(registry.live_handles(), 0);
    }

    #[test]
    fn test_enumerate_is_lazy_and_restartable() {
        let registry = registry();

        let mut iter = registry.enumerate_services("IOHIDDevice");
        let mut first = iter.next().unwrap();
        assert_eq!(registry.live_handles(), 1);
        let mut second = iter.next().unwrap();
        assert!(iter.next().is_none());
        drop(iter);

        registry.release(&mut first);
        registry.release(&mut second);
        assert_eq!(registry.live_handles(), 0);

        assert_eq!(registry.enumerate_services("IOHIDDevice").count(), 2);
    }

    #[test]
    fn test_require_service() {
        let registry = registry();
        assert!(matches!(
            registry.require_service("AppleEmbeddedGyro"),
            Err(Error::ServiceNotFound(name)) if name == "AppleEmbeddedGyro"
        ));
        assert!(registry.require_service("AppleSMC").is_ok());
    }

    #[test]
    fn test_read_failure_carries_code() {
        let registry = registry();
        let handles: Vec<DeviceHandle> = registry.enumerate_services("IOHIDDevice").collect();

        assert!(registry.read_properties(&handles[0]).is_ok());
        match registry.read_properties(&handles[1]) {
            Err(Error::PropertyRead { service, code }) => {
                assert_eq!(service, "IOHIDDevice");
                assert_eq!(code, 0x2c2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_release_twice_and_read_after_release() {
        let registry = registry();
        let mut handle = registry.find_service("AppleSMC").unwrap();

        registry.release(&mut handle);
        registry.release(&mut handle);
        assert_eq!(registry.live_handles(), 0);

        assert!(matches!(
            registry.read_properties(&handle),
            Err(Error::PropertyRead { code: STATUS_BAD_ARGUMENT, .. })
        ));
    }

    #[test]
    fn test_snapshot_parsing() {
        let registry = MemoryRegistry::from_snapshot_str(
            r#"{
                "services": [
                    {"class": "AppleSPUHIDInterface", "properties": {"AOP Sensors": {"accelX": 0}}},
                    {"class": "AppleSMC", "error": -536870212},
                    {"class": "IOHIDDevice"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(registry.len(), 3);

        let handle = registry.find_service("AppleSPUHIDInterface").unwrap();
        let tree = registry.read_properties(&handle).unwrap();
        assert!(tree.get("AOP Sensors").and_then(PropertyValue::as_tree).is_some());

        let smc = registry.find_service("AppleSMC").unwrap();
        assert!(registry.read_properties(&smc).is_err());

        let hid = registry.find_service("IOHIDDevice").unwrap();
        assert!(registry.read_properties(&hid).unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_rejects_garbage() {
        assert!(MemoryRegistry::from_snapshot_str("{\"services\": 3}").is_err());
    }
}
