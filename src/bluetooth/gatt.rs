//! GATT objects handed out to a test page
//!
//! Each object is a thin handle: an instance id plus a `SimulationHandle`.
//! All state lives in the simulation, so handles stay cheap to clone and a
//! handle whose attribute was removed fails with `InvalidStateError`.

use log::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::simulation::central::{CharacteristicMsg, DescriptorMsg, DeviceMsg, ServiceMsg};
use crate::simulation::device::InstanceId;
use crate::simulation::properties::{CharacteristicProperties, WriteType};
use crate::simulation::uuids;
use crate::simulation::{DeviceAddress, SimulationHandle};

/// A device granted by `requestDevice()`
#[derive(Debug, Clone)]
pub struct BluetoothDevice {
    handle: SimulationHandle,
    id: InstanceId,
    address: DeviceAddress,
    name: Option<String>,
}

impl BluetoothDevice {
    pub(crate) fn new(handle: SimulationHandle, msg: DeviceMsg) -> Self {
        Self {
            handle,
            id: msg.id,
            address: msg.address,
            name: msg.name,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn gatt(&self) -> RemoteGattServer {
        RemoteGattServer {
            handle: self.handle.clone(),
            device: self.id,
        }
    }
}

/// `BluetoothRemoteGATTServer`
#[derive(Debug, Clone)]
pub struct RemoteGattServer {
    handle: SimulationHandle,
    device: InstanceId,
}

impl RemoteGattServer {
    pub async fn connect(&self) -> Result<RemoteGattServer> {
        self.handle.gatt_connect(self.device).await?;
        Ok(self.clone())
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.handle.gatt_disconnect(self.device).await
    }

    pub async fn connected(&self) -> Result<bool> {
        self.handle.is_connected(self.device).await
    }

    pub async fn get_primary_service(&self, service: &str) -> Result<RemoteGattService> {
        let uuid = uuids::service(service)?;
        let services = self.handle.get_primary_services(self.device, Some(uuid), true).await?;
        self.wrap(services)
            .into_iter()
            .next()
            .ok_or_else(|| not_found("Service", uuid))
    }

    /// All allowed primary services, or those matching `service`
    pub async fn get_primary_services(&self, service: Option<&str>) -> Result<Vec<RemoteGattService>> {
        let uuid = service.map(uuids::service).transpose()?;
        let services = self.handle.get_primary_services(self.device, uuid, false).await?;
        Ok(self.wrap(services))
    }

    fn wrap(&self, services: Vec<ServiceMsg>) -> Vec<RemoteGattService> {
        services
            .into_iter()
            .map(|msg| RemoteGattService {
                handle: self.handle.clone(),
                id: msg.id,
                uuid: msg.uuid,
                is_primary: msg.is_primary,
            })
            .collect()
    }
}

/// `BluetoothRemoteGATTService`
#[derive(Debug, Clone)]
pub struct RemoteGattService {
    handle: SimulationHandle,
    id: InstanceId,
    uuid: Uuid,
    is_primary: bool,
}

impl RemoteGattService {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    pub async fn get_characteristic(&self, characteristic: &str) -> Result<RemoteGattCharacteristic> {
        let uuid = uuids::characteristic(characteristic)?;
        debug!(
            "getCharacteristic({}) on service {}",
            characteristic,
            uuids::describe(uuids::AttributeKind::Service, &self.uuid)
        );
        let found = self.handle.get_characteristics(self.id, Some(uuid), true).await?;
        self.wrap(found)
            .into_iter()
            .next()
            .ok_or_else(|| not_found("Characteristic", uuid))
    }

    pub async fn get_characteristics(
        &self,
        characteristic: Option<&str>,
    ) -> Result<Vec<RemoteGattCharacteristic>> {
        let uuid = characteristic.map(uuids::characteristic).transpose()?;
        let found = self.handle.get_characteristics(self.id, uuid, false).await?;
        Ok(self.wrap(found))
    }

    fn wrap(&self, characteristics: Vec<CharacteristicMsg>) -> Vec<RemoteGattCharacteristic> {
        characteristics
            .into_iter()
            .map(|msg| RemoteGattCharacteristic {
                handle: self.handle.clone(),
                id: msg.id,
                uuid: msg.uuid,
                properties: msg.properties,
            })
            .collect()
    }
}

/// `BluetoothRemoteGATTCharacteristic`
#[derive(Debug, Clone)]
pub struct RemoteGattCharacteristic {
    handle: SimulationHandle,
    id: InstanceId,
    uuid: Uuid,
    properties: CharacteristicProperties,
}

impl RemoteGattCharacteristic {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Properties as discovered; fixed for the lifetime of this object
    pub fn properties(&self) -> CharacteristicProperties {
        self.properties
    }

    pub async fn read_value(&self) -> Result<Vec<u8>> {
        self.handle.read_value(self.id).await
    }

    /// Accepted when the characteristic has either write property
    pub async fn write_value(&self, value: &[u8]) -> Result<()> {
        self.handle.write_value(self.id, value.to_vec(), WriteType::Any).await
    }

    pub async fn write_value_with_response(&self, value: &[u8]) -> Result<()> {
        self.handle
            .write_value(self.id, value.to_vec(), WriteType::WithResponse)
            .await
    }

    pub async fn write_value_without_response(&self, value: &[u8]) -> Result<()> {
        self.handle
            .write_value(self.id, value.to_vec(), WriteType::WithoutResponse)
            .await
    }

    pub async fn start_notifications(&self) -> Result<()> {
        self.handle.set_notifications(self.id, true).await
    }

    pub async fn stop_notifications(&self) -> Result<()> {
        self.handle.set_notifications(self.id, false).await
    }

    pub async fn get_descriptor(&self, descriptor: &str) -> Result<RemoteGattDescriptor> {
        let uuid = uuids::descriptor(descriptor)?;
        let found = self.handle.get_descriptors(self.id, Some(uuid), true).await?;
        self.wrap(found)
            .into_iter()
            .next()
            .ok_or_else(|| not_found("Descriptor", uuid))
    }

    pub async fn get_descriptors(&self, descriptor: Option<&str>) -> Result<Vec<RemoteGattDescriptor>> {
        let uuid = descriptor.map(uuids::descriptor).transpose()?;
        let found = self.handle.get_descriptors(self.id, uuid, false).await?;
        Ok(self.wrap(found))
    }

    fn wrap(&self, descriptors: Vec<DescriptorMsg>) -> Vec<RemoteGattDescriptor> {
        descriptors
            .into_iter()
            .map(|msg| RemoteGattDescriptor {
                handle: self.handle.clone(),
                id: msg.id,
                uuid: msg.uuid,
            })
            .collect()
    }
}

/// `BluetoothRemoteGATTDescriptor`
#[derive(Debug, Clone)]
pub struct RemoteGattDescriptor {
    handle: SimulationHandle,
    id: InstanceId,
    uuid: Uuid,
}

impl RemoteGattDescriptor {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub async fn read_value(&self) -> Result<Vec<u8>> {
        self.handle.read_descriptor(self.id).await
    }

    pub async fn write_value(&self, value: &[u8]) -> Result<()> {
        self.handle.write_descriptor(self.id, value.to_vec()).await
    }
}

fn not_found(kind: &str, uuid: Uuid) -> crate::error::BridgeError {
    crate::error::BluetoothError::NotFound(format!("No {}s matching UUID {} found.", kind, uuid)).into()
}
