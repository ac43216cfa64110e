//! `requestDevice()` options and scan filters

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::{BluetoothError, BluetoothResult};
use crate::simulation::device::SimulatedDevice;
use crate::simulation::uuids;

/// Manufacturer data filter: `data & mask` must equal `prefix & mask`.
/// An empty mask compares every prefix byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManufacturerDataFilter {
    pub company_identifier: u16,
    pub data_prefix: Vec<u8>,
    pub mask: Vec<u8>,
}

impl ManufacturerDataFilter {
    fn validate(&self) -> BluetoothResult<()> {
        if !self.mask.is_empty() && self.mask.len() != self.data_prefix.len() {
            return Err(BluetoothError::Type(
                "'dataPrefix' and 'mask' must have the same length.".to_string(),
            ));
        }
        Ok(())
    }
}

/// One entry of `filters`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanFilter {
    pub name: Option<String>,
    pub name_prefix: Option<String>,
    pub services: Vec<Uuid>,
    pub manufacturer_data: Vec<ManufacturerDataFilter>,
}

impl ScanFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// Require services, given as names, aliases or UUID strings
    pub fn with_services(mut self, services: &[&str]) -> BluetoothResult<Self> {
        for service in services {
            self.services.push(uuids::service(service)?);
        }
        Ok(self)
    }

    pub fn with_manufacturer_data(mut self, filter: ManufacturerDataFilter) -> Self {
        self.manufacturer_data.push(filter);
        self
    }

    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.name_prefix.is_none()
            && self.services.is_empty()
            && self.manufacturer_data.is_empty()
    }

    // https://webbluetoothcg.github.io/web-bluetooth/#matches-a-filter
    pub fn matches(&self, device: &SimulatedDevice) -> bool {
        if let Some(name) = &self.name {
            if device.name.as_ref() != Some(name) {
                return false;
            }
        }

        if let Some(prefix) = &self.name_prefix {
            match &device.name {
                Some(device_name) if device_name.starts_with(prefix.as_str()) => {}
                _ => return false,
            }
        }

        if !self
            .services
            .iter()
            .all(|service| device.known_service_uuids.contains(service))
        {
            return false;
        }

        self.manufacturer_data.iter().all(|filter| {
            device
                .manufacturer_data
                .get(&filter.company_identifier)
                .map_or(false, |data| data_filter_matches(data, &filter.data_prefix, &filter.mask))
        })
    }
}

fn data_filter_matches(data: &[u8], prefix: &[u8], mask: &[u8]) -> bool {
    if data.len() < prefix.len() || (!mask.is_empty() && mask.len() != prefix.len()) {
        return false;
    }
    prefix.iter().zip(data).enumerate().all(|(i, (p, d))| {
        let m = mask.get(i).copied().unwrap_or(0xff);
        d & m == p & m
    })
}

/// Options of `requestDevice()`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDeviceOptions {
    pub filters: Vec<ScanFilter>,
    pub optional_services: Vec<Uuid>,
    pub accept_all_devices: bool,
}

impl RequestDeviceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_all_devices() -> Self {
        Self {
            accept_all_devices: true,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: ScanFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_optional_services(mut self, services: &[&str]) -> BluetoothResult<Self> {
        for service in services {
            self.optional_services.push(uuids::service(service)?);
        }
        Ok(self)
    }

    /// Reject option combinations `requestDevice()` throws a TypeError for
    pub fn validate(&self) -> BluetoothResult<()> {
        if self.accept_all_devices && !self.filters.is_empty() {
            return Err(BluetoothError::Type(
                "Cannot set both 'filters' and 'acceptAllDevices'.".to_string(),
            ));
        }
        if !self.accept_all_devices && self.filters.is_empty() {
            return Err(BluetoothError::Type(
                "Either 'filters' should be present or 'acceptAllDevices' should be true, \
                 but not both."
                    .to_string(),
            ));
        }
        if self.filters.iter().any(ScanFilter::is_empty) {
            return Err(BluetoothError::Type(
                "A filter must restrict the devices in some way.".to_string(),
            ));
        }
        self.filters
            .iter()
            .flat_map(|f| f.manufacturer_data.iter())
            .try_for_each(ManufacturerDataFilter::validate)
    }

    pub fn matches(&self, device: &SimulatedDevice) -> bool {
        self.accept_all_devices || self.filters.iter().any(|f| f.matches(device))
    }

    /// Services the page may access once a device is granted
    pub fn services_set(&self) -> HashSet<Uuid> {
        self.filters
            .iter()
            .flat_map(|f| f.services.iter().copied())
            .chain(self.optional_services.iter().copied())
            .collect()
    }
}
