// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Linux sysfs registry - device directories as registry services
//!
//! Every directory directly under the root is a service. Its class is the
//! content of its `name` attribute, or the directory name when there is
//! none. Attribute files become scalars and subdirectories become nested
//! mappings. Symlinks are skipped so the tree stays acyclic.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use super::{DeviceHandle, DeviceRegistry, PropertyTree, PropertyValue, STATUS_BAD_ARGUMENT};
use crate::error::{Error, Result};

/// Attribute files larger than this are recorded as their size only
const MAX_ATTRIBUTE_BYTES: u64 = 4096;

/// Registry over a sysfs device directory
pub struct SysfsRegistry {
    root: PathBuf,
    live: Mutex<HashMap<u64, PathBuf>>,
    next_id: AtomicU64,
}

impl SysfsRegistry {
    /// Registry rooted at `root`, e.g. `/sys/bus/iio/devices`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            live: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Directory whose subdirectories are the services
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Service directories with their class names, in directory-name order
    fn services(&self) -> Vec<(String, PathBuf)> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {:?}: {}", self.root, e);
                return Vec::new();
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        dirs.into_iter()
            .map(|dir| (class_name(&dir), dir))
            .collect()
    }

    fn issue(&self, class: &str, dir: PathBuf) -> DeviceHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.lock().insert(id, dir);
        DeviceHandle::new(id, class)
    }
}

fn class_name(dir: &Path) -> String {
    fs::read_to_string(dir.join("name"))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            dir.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
}

fn parse_attribute(bytes: Vec<u8>) -> PropertyValue {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => return PropertyValue::Data(e.into_bytes()),
    };
    let text = text.trim();

    if let Ok(i) = text.parse::<i64>() {
        PropertyValue::Integer(i)
    } else if let Ok(f) = text.parse::<f64>() {
        PropertyValue::Float(f)
    } else {
        PropertyValue::String(text.to_string())
    }
}

fn read_tree(dir: &Path) -> io::Result<PropertyTree> {
    let mut entries: Vec<fs::DirEntry> = fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    let mut tree = PropertyTree::new();
    for entry in entries {
        let key = entry.file_name().to_string_lossy().into_owned();
        let meta = match fs::symlink_metadata(entry.path()) {
            Ok(meta) => meta,
            Err(_) => continue,
        };

        if meta.file_type().is_symlink() {
            continue;
        }

        if meta.is_dir() {
            match read_tree(&entry.path()) {
                Ok(sub) => tree.insert(&key, PropertyValue::Tree(sub)),
                Err(e) => debug!("Skipping {:?}: {}", entry.path(), e),
            }
        } else if meta.len() > MAX_ATTRIBUTE_BYTES {
            tree.insert(&key, PropertyValue::Integer(meta.len() as i64));
        } else {
            // Write-only and busy attributes fail to read; they are not properties.
            match fs::read(entry.path()) {
                Ok(bytes) => tree.insert(&key, parse_attribute(bytes)),
                Err(e) => debug!("Unreadable attribute {:?}: {}", entry.path(), e),
            }
        }
    }

    Ok(tree)
}

impl DeviceRegistry for SysfsRegistry {
    fn find_service(&self, name: &str) -> Option<DeviceHandle> {
        let (class, dir) = self.services().into_iter().find(|(class, _)| class == name)?;
        Some(self.issue(&class, dir))
    }

    fn enumerate_services<'a>(
        &'a self,
        name: &'a str,
    ) -> Box<dyn Iterator<Item = DeviceHandle> + 'a> {
        Box::new(
            self.services()
                .into_iter()
                .filter(move |(class, _)| class == name)
                .map(move |(class, dir)| self.issue(&class, dir)),
        )
    }

    fn read_properties(&self, handle: &DeviceHandle) -> Result<PropertyTree> {
        let dir = match self.live.lock().get(&handle.id()) {
            Some(dir) if !handle.is_released() => dir.clone(),
            _ => {
                return Err(Error::PropertyRead {
                    service: handle.class_name().to_string(),
                    code: STATUS_BAD_ARGUMENT,
                })
            }
        };

        read_tree(&dir).map_err(|e| Error::PropertyRead {
            service: handle.class_name().to_string(),
            code: e.raw_os_error().unwrap_or(-1),
        })
    }

    fn release(&self, handle: &mut DeviceHandle) {
        if handle.mark_released() {
            self.live.lock().remove(&handle.id());
        }
    }
}
