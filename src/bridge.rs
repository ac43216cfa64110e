//! Fake Adapter Bridge
//!
//! The control plane a test uses to push adapter and device configuration
//! into the simulation before it exercises the Web Bluetooth API.
//! Attribute names are resolved here, so a bad name is reported as a
//! configuration failure rather than an API error.

use std::sync::Arc;

use log::{debug, info};
use uuid::Uuid;

use crate::error::{BridgeError, Result};
use crate::simulation::uuids::{self, AttributeKind};
use crate::simulation::{
    CentralConfig, CentralController, CharacteristicPath, CharacteristicProperties, DeviceAddress,
    InstanceId, PeripheralConfig, SimulationAction,
};

/// Resolve an attribute name for a configuration command
pub fn resolve_uuid(kind: AttributeKind, name: &str) -> Result<Uuid> {
    uuids::resolve(kind, name).map_err(|e| BridgeError::Configuration(e.to_string()))
}

/// Control-plane handle for one simulation
#[derive(Clone)]
pub struct FakeAdapterBridge {
    controller: Arc<dyn CentralController>,
}

impl std::fmt::Debug for FakeAdapterBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeAdapterBridge").finish_non_exhaustive()
    }
}

impl FakeAdapterBridge {
    pub fn new(controller: Arc<dyn CentralController>) -> Self {
        Self { controller }
    }

    /// Set the adapter state; resolves once the simulation has applied it
    pub async fn simulate_central(&self, config: CentralConfig) -> Result<()> {
        info!("simulateCentral({})", config.state());
        self.controller.simulate_central(config).await
    }

    /// Add a discoverable peripheral, advertising `known_services`
    pub async fn simulate_preconnected_peripheral(
        &self,
        address: &str,
        name: Option<&str>,
        known_services: &[&str],
    ) -> Result<InstanceId> {
        let mut config = PeripheralConfig::new(address.parse()?);
        if let Some(name) = name {
            config = config.with_name(name);
        }
        for service in known_services {
            config = config.with_known_service(resolve_uuid(AttributeKind::Service, service)?);
        }
        self.simulate_peripheral(config).await
    }

    /// Add a peripheral the chooser never offers
    pub async fn simulate_hidden_peripheral(
        &self,
        address: &str,
        name: Option<&str>,
    ) -> Result<InstanceId> {
        let mut config = PeripheralConfig::new(address.parse()?).with_discoverable(false);
        if let Some(name) = name {
            config = config.with_name(name);
        }
        self.simulate_peripheral(config).await
    }

    /// Add a peripheral from a fully built config
    pub async fn simulate_peripheral(&self, config: PeripheralConfig) -> Result<InstanceId> {
        debug!(
            "simulatePreconnectedPeripheral({}, discoverable: {})",
            config.address, config.discoverable
        );
        self.controller.simulate_preconnected_peripheral(config).await
    }

    pub async fn simulate_service(
        &self,
        address: DeviceAddress,
        service: &str,
        action: SimulationAction,
    ) -> Result<()> {
        let uuid = resolve_uuid(AttributeKind::Service, service)?;
        debug!("simulateService({}, {}, {:?})", address, service, action);
        self.controller.simulate_service(address, uuid, action).await
    }

    pub async fn simulate_characteristic(
        &self,
        address: DeviceAddress,
        service: &str,
        characteristic: &str,
        properties: CharacteristicProperties,
        action: SimulationAction,
    ) -> Result<()> {
        let path = Self::path(address, service, characteristic)?;
        debug!(
            "simulateCharacteristic({}, {}, {}, {:?}, {:?})",
            address,
            service,
            characteristic,
            properties.names(),
            action
        );
        self.controller
            .simulate_characteristic(path, properties, action)
            .await
    }

    pub async fn simulate_descriptor(
        &self,
        address: DeviceAddress,
        service: &str,
        characteristic: &str,
        descriptor: &str,
        action: SimulationAction,
    ) -> Result<()> {
        let path = Self::path(address, service, characteristic)?;
        let uuid = resolve_uuid(AttributeKind::Descriptor, descriptor)?;
        self.controller.simulate_descriptor(path, uuid, action).await
    }

    pub async fn set_characteristic_value(
        &self,
        address: DeviceAddress,
        service: &str,
        characteristic: &str,
        value: &[u8],
    ) -> Result<()> {
        let path = Self::path(address, service, characteristic)?;
        self.controller
            .set_characteristic_value(path, value.to_vec())
            .await
    }

    /// Drop all simulated state; the adapter goes back to `absent`
    pub async fn reset(&self) -> Result<()> {
        info!("disableSimulation");
        self.controller.reset().await
    }

    fn path(address: DeviceAddress, service: &str, characteristic: &str) -> Result<CharacteristicPath> {
        Ok(CharacteristicPath {
            address,
            service: resolve_uuid(AttributeKind::Service, service)?,
            characteristic: resolve_uuid(AttributeKind::Characteristic, characteristic)?,
        })
    }
}
