//! Simulated peripherals and their GATT attribute tree

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::address::DeviceAddress;
use super::properties::CharacteristicProperties;

/// Identifier of a device or GATT attribute inside one simulation.
///
/// Ids are handed out from a counter and never reused by the same
/// simulation, including across `reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub(crate) u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Add or remove an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationAction {
    Add,
    Remove,
}

/// Parameters of a simulated peripheral
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralConfig {
    pub address: DeviceAddress,
    pub name: Option<String>,
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    /// Advertised service UUIDs, used by request filters
    pub known_service_uuids: Vec<Uuid>,
    pub discoverable: bool,
}

impl PeripheralConfig {
    pub fn new(address: DeviceAddress) -> Self {
        Self {
            address,
            name: None,
            manufacturer_data: HashMap::new(),
            known_service_uuids: Vec::new(),
            discoverable: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_manufacturer_data(mut self, company: u16, data: Vec<u8>) -> Self {
        self.manufacturer_data.insert(company, data);
        self
    }

    pub fn with_known_service(mut self, uuid: Uuid) -> Self {
        self.known_service_uuids.push(uuid);
        self
    }

    pub fn with_discoverable(mut self, discoverable: bool) -> Self {
        self.discoverable = discoverable;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedDescriptor {
    pub id: InstanceId,
    pub uuid: Uuid,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedCharacteristic {
    pub id: InstanceId,
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
    pub value: Vec<u8>,
    pub notifying: bool,
    pub descriptors: Vec<SimulatedDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedService {
    pub id: InstanceId,
    pub uuid: Uuid,
    pub characteristics: Vec<SimulatedCharacteristic>,
}

impl SimulatedService {
    pub fn characteristic(&self, uuid: &Uuid) -> Option<&SimulatedCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == *uuid)
    }

    pub fn characteristic_mut(&mut self, uuid: &Uuid) -> Option<&mut SimulatedCharacteristic> {
        self.characteristics.iter_mut().find(|c| c.uuid == *uuid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedDevice {
    pub id: InstanceId,
    pub address: DeviceAddress,
    pub name: Option<String>,
    pub discoverable: bool,
    pub connected: bool,
    pub known_service_uuids: Vec<Uuid>,
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    pub services: Vec<SimulatedService>,
}

impl SimulatedDevice {
    pub fn from_config(id: InstanceId, config: PeripheralConfig) -> Self {
        Self {
            id,
            address: config.address,
            name: config.name,
            discoverable: config.discoverable,
            connected: false,
            known_service_uuids: config.known_service_uuids,
            manufacturer_data: config.manufacturer_data,
            services: Vec::new(),
        }
    }

    /// First service with `uuid`
    pub fn service(&self, uuid: &Uuid) -> Option<&SimulatedService> {
        self.services.iter().find(|s| s.uuid == *uuid)
    }

    pub fn service_mut(&mut self, uuid: &Uuid) -> Option<&mut SimulatedService> {
        self.services.iter_mut().find(|s| s.uuid == *uuid)
    }
}
