// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Service locator - decides once whether a usable sensor service exists

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::search::{dump_tree, CaseMode, PropertySearch};
use super::DiscoveryStatus;
use crate::config::DiscoveryConfig;
use crate::error::{Error, Result};
use crate::registry::{DeviceHandle, DeviceRegistry, PropertyTree};

/// How a fallback candidate was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateSource {
    /// Broad enumeration of the generic HID class
    Enumerated,
    /// Exact lookup of a known alternate service name
    Named,
}

/// Diagnostic record of one service inspected on the fallback path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackCandidate {
    /// Class name of the inspected service
    pub service: String,
    /// How the service was reached
    pub source: CandidateSource,
    /// Top-level keys matching the diagnostic tokens
    pub matching_keys: Vec<String>,
    /// Whether a sensor-shaped subtree exists anywhere in its properties
    pub has_sensor_subtree: bool,
    /// Whether the property read succeeded
    pub readable: bool,
}

/// Outcome of a discovery run
#[derive(Debug)]
pub struct Discovery {
    /// Whether a usable sensor subtree was found on the primary service
    pub sensor_found: bool,
    /// Final status
    pub status: DiscoveryStatus,
    /// Every status the run passed through, in order
    pub transitions: Vec<DiscoveryStatus>,
    /// The primary service, retained whether or not sensors were readable
    pub handle: Option<DeviceHandle>,
    /// The matched sensor subtree
    pub sensor_properties: Option<PropertyTree>,
    /// Fallback services inspected for diagnostics
    pub candidates: Vec<FallbackCandidate>,
}

impl Discovery {
    fn new() -> Self {
        Self {
            sensor_found: false,
            status: DiscoveryStatus::Initializing,
            transitions: Vec::new(),
            handle: None,
            sensor_properties: None,
            candidates: Vec::new(),
        }
    }

    /// The matched sensor subtree, or why there is none
    pub fn require_sensor(&self) -> Result<&PropertyTree> {
        self.sensor_properties.as_ref().ok_or(Error::NoUsableSensor)
    }

    fn set_status(&mut self, status: DiscoveryStatus) {
        debug!("Discovery status: {}", status);
        self.status = status;
        self.transitions.push(status);
    }
}

/// Runs the primary lookup and, failing that, the diagnostic fallback path
pub struct ServiceLocator {
    primary_service: String,
    hid_class: String,
    fallback_services: Vec<String>,
    primary: PropertySearch,
    diagnostic: PropertySearch,
}

impl ServiceLocator {
    /// Locator for the configured service names and tokens
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self {
            primary_service: config.primary_service.clone(),
            hid_class: config.hid_class.clone(),
            fallback_services: config.fallback_services.clone(),
            primary: PropertySearch::new(config.sensor_tokens.as_slice(), CaseMode::Sensitive),
            diagnostic: PropertySearch::new(config.diagnostic_tokens.as_slice(), CaseMode::Insensitive),
        }
    }

    /// Run discovery against `registry`. Read failures are logged, never returned.
    pub fn locate(&self, registry: &dyn DeviceRegistry) -> Discovery {
        let mut discovery = Discovery::new();
        discovery.set_status(DiscoveryStatus::Searching);

        match registry.find_service(&self.primary_service) {
            Some(handle) => {
                info!("✅ Found {}", self.primary_service);
                discovery.set_status(DiscoveryStatus::PrimaryServiceFound);

                match self.read_sensor_properties(registry, &handle) {
                    Some(sensors) => {
                        info!("✅ AOP sensors found ({} keys)", sensors.len());
                        discovery.sensor_found = true;
                        discovery.sensor_properties = Some(sensors);
                        discovery.set_status(DiscoveryStatus::SensorsDetected);
                    }
                    None => {
                        discovery.set_status(DiscoveryStatus::SensorsNotAccessible);
                    }
                }

                discovery.handle = Some(handle);
            }
            None => {
                info!("❌ {} not found", self.primary_service);
                discovery.set_status(DiscoveryStatus::PrimaryServiceNotFound);
                discovery.candidates = self.probe_fallbacks(registry);
            }
        }

        discovery
    }

    fn read_sensor_properties(
        &self,
        registry: &dyn DeviceRegistry,
        handle: &DeviceHandle,
    ) -> Option<PropertyTree> {
        let properties = match registry.read_properties(handle) {
            Ok(properties) => properties,
            Err(e) => {
                warn!("❌ Could not read {} properties: {}", self.primary_service, e);
                return None;
            }
        };

        trace!("📊 {} properties:\n{}", self.primary_service, dump_tree(&properties));
        self.primary.search(&properties).cloned()
    }

    /// Best-effort diagnosis only. Nothing found here marks a sensor as found.
    fn probe_fallbacks(&self, registry: &dyn DeviceRegistry) -> Vec<FallbackCandidate> {
        let mut candidates = Vec::new();

        for mut handle in registry.enumerate_services(&self.hid_class) {
            candidates.push(self.inspect(registry, &handle, CandidateSource::Enumerated));
            registry.release(&mut handle);
        }

        for name in &self.fallback_services {
            if let Some(mut handle) = registry.find_service(name) {
                info!("✅ Found service: {}", name);
                candidates.push(self.inspect(registry, &handle, CandidateSource::Named));
                registry.release(&mut handle);
            }
        }

        debug!("Fallback probe inspected {} services", candidates.len());
        candidates
    }

    fn inspect(
        &self,
        registry: &dyn DeviceRegistry,
        handle: &DeviceHandle,
        source: CandidateSource,
    ) -> FallbackCandidate {
        let service = handle.class_name().to_string();

        let properties = match registry.read_properties(handle) {
            Ok(properties) => properties,
            Err(e) => {
                warn!("Skipping {}: {}", service, e);
                return FallbackCandidate {
                    service,
                    source,
                    matching_keys: Vec::new(),
                    has_sensor_subtree: false,
                    readable: false,
                };
            }
        };

        let matches = self.diagnostic.matching_keys(&properties);
        for (key, value) in &matches {
            info!("🎯 Sensor-related: {} = {}", key, value);
        }

        FallbackCandidate {
            matching_keys: matches.iter().map(|(k, _)| k.to_string()).collect(),
            has_sensor_subtree: self.diagnostic.search(&properties).is_some(),
            readable: true,
            service,
            source,
        }
    }
}

impl Default for ServiceLocator {
    fn default() -> Self {
        Self::new(&DiscoveryConfig::default())
    }
}
