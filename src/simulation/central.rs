//! The simulated central: adapter state, peripherals and their GATT databases.
//!
//! `FakeCentral` is plain synchronous state. Control commands from the bridge
//! fail with `BridgeError::Configuration`; calls made on behalf of the page
//! fail with the `BluetoothError` the page would observe.

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};
use tokio::sync::mpsc::Sender;
use uuid::Uuid;

use super::address::DeviceAddress;
use super::device::{
    InstanceId, PeripheralConfig, SimulatedCharacteristic, SimulatedDescriptor, SimulatedDevice,
    SimulatedService, SimulationAction,
};
use super::events::SimulationEvent;
use super::properties::{CharacteristicProperties, WriteType};
use super::state::{CentralConfig, SimulatedAdapterState};
use crate::bluetooth::options::RequestDeviceOptions;
use crate::error::{BluetoothError, BluetoothResult, BridgeError};

/// A device granted to the page by `requestDevice()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMsg {
    pub id: InstanceId,
    pub address: DeviceAddress,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMsg {
    pub id: InstanceId,
    pub device_id: InstanceId,
    pub uuid: Uuid,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicMsg {
    pub id: InstanceId,
    pub service_id: InstanceId,
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorMsg {
    pub id: InstanceId,
    pub characteristic_id: InstanceId,
    pub uuid: Uuid,
}

/// Where to find a characteristic in the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicPath {
    pub address: DeviceAddress,
    pub service: Uuid,
    pub characteristic: Uuid,
}

/// The simulation backend for one test case
pub struct FakeCentral {
    state: SimulatedAdapterState,
    devices: Vec<SimulatedDevice>,
    allowed_services: HashMap<InstanceId, HashSet<Uuid>>,
    next_id: u64,
    events: Option<Sender<SimulationEvent>>,
}

impl Default for FakeCentral {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCentral {
    pub fn new() -> Self {
        Self {
            state: SimulatedAdapterState::Absent,
            devices: Vec::new(),
            allowed_services: HashMap::new(),
            next_id: 1,
            events: None,
        }
    }

    /// Publish changes to `sender`
    pub fn with_events(mut self, sender: Sender<SimulationEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn state(&self) -> SimulatedAdapterState {
        self.state
    }

    pub fn devices(&self) -> &[SimulatedDevice] {
        &self.devices
    }

    pub fn device(&self, address: &DeviceAddress) -> Option<&SimulatedDevice> {
        self.devices.iter().find(|d| d.address == *address)
    }

    fn generate_id(&mut self) -> InstanceId {
        let id = self.peek_id();
        self.next_id += 1;
        id
    }

    /// The id `generate_id` hands out next; claimed only once the parent lookup succeeded
    fn peek_id(&self) -> InstanceId {
        InstanceId(self.next_id)
    }

    fn emit(&self, event: SimulationEvent) {
        if let Some(sender) = &self.events {
            if let Err(e) = sender.try_send(event) {
                debug!("Dropped simulation event: {}", e);
            }
        }
    }

    // Control

    pub fn simulate_central(&mut self, config: CentralConfig) {
        let state = config.state();
        if state == self.state {
            debug!("Adapter already {}", state);
            return;
        }

        info!("Simulated adapter: {} -> {}", self.state, state);
        self.state = state;
        if !state.is_present() {
            self.devices.clear();
            self.allowed_services.clear();
        } else if !state.is_powered() {
            for device in &mut self.devices {
                device.connected = false;
            }
        }
        self.emit(SimulationEvent::AdapterStateChanged(state));
    }

    pub fn simulate_preconnected_peripheral(
        &mut self,
        config: PeripheralConfig,
    ) -> Result<InstanceId, BridgeError> {
        if !self.state.is_present() {
            return Err(BridgeError::Configuration(
                "cannot add a peripheral without a simulated adapter".to_string(),
            ));
        }
        if self.device(&config.address).is_some() {
            return Err(BridgeError::Configuration(format!(
                "peripheral {} already exists",
                config.address
            )));
        }

        let id = self.generate_id();
        let address = config.address;
        debug!("Adding peripheral {} as {}", address, id);
        self.devices.push(SimulatedDevice::from_config(id, config));
        self.emit(SimulationEvent::PeripheralAdded(address));
        Ok(id)
    }

    fn device_mut_or_err(&mut self, address: &DeviceAddress) -> Result<&mut SimulatedDevice, BridgeError> {
        self.devices
            .iter_mut()
            .find(|d| d.address == *address)
            .ok_or_else(|| BridgeError::Configuration(format!("unknown peripheral {}", address)))
    }

    fn characteristic_mut_or_err(
        &mut self,
        path: &CharacteristicPath,
    ) -> Result<&mut SimulatedCharacteristic, BridgeError> {
        let device = self.device_mut_or_err(&path.address)?;
        let service = device.service_mut(&path.service).ok_or_else(|| {
            BridgeError::Configuration(format!("unknown service {} on {}", path.service, path.address))
        })?;
        service.characteristic_mut(&path.characteristic).ok_or_else(|| {
            BridgeError::Configuration(format!(
                "unknown characteristic {} in service {}",
                path.characteristic, path.service
            ))
        })
    }

    pub fn simulate_service(
        &mut self,
        address: DeviceAddress,
        uuid: Uuid,
        action: SimulationAction,
    ) -> Result<(), BridgeError> {
        let id = self.peek_id();
        let device = self.device_mut_or_err(&address)?;
        match action {
            SimulationAction::Add => {
                device.services.push(SimulatedService {
                    id,
                    uuid,
                    characteristics: Vec::new(),
                });
                self.next_id += 1;
                self.emit(SimulationEvent::ServiceAdded { address, uuid });
            }
            SimulationAction::Remove => {
                let index = device.services.iter().position(|s| s.uuid == uuid).ok_or_else(|| {
                    BridgeError::Configuration(format!("unknown service {} on {}", uuid, address))
                })?;
                device.services.remove(index);
                self.emit(SimulationEvent::ServiceRemoved { address, uuid });
            }
        }
        Ok(())
    }

    pub fn simulate_characteristic(
        &mut self,
        path: CharacteristicPath,
        properties: CharacteristicProperties,
        action: SimulationAction,
    ) -> Result<(), BridgeError> {
        let id = self.peek_id();
        let device = self.device_mut_or_err(&path.address)?;
        let service = device.service_mut(&path.service).ok_or_else(|| {
            BridgeError::Configuration(format!("unknown service {} on {}", path.service, path.address))
        })?;

        match action {
            SimulationAction::Add => {
                service.characteristics.push(SimulatedCharacteristic {
                    id,
                    uuid: path.characteristic,
                    properties,
                    value: Vec::new(),
                    notifying: false,
                    descriptors: Vec::new(),
                });
                self.next_id += 1;
                self.emit(SimulationEvent::CharacteristicAdded {
                    address: path.address,
                    uuid: path.characteristic,
                });
            }
            SimulationAction::Remove => {
                let index = service
                    .characteristics
                    .iter()
                    .position(|c| c.uuid == path.characteristic)
                    .ok_or_else(|| {
                        BridgeError::Configuration(format!(
                            "unknown characteristic {} in service {}",
                            path.characteristic, path.service
                        ))
                    })?;
                service.characteristics.remove(index);
                self.emit(SimulationEvent::CharacteristicRemoved {
                    address: path.address,
                    uuid: path.characteristic,
                });
            }
        }
        Ok(())
    }

    pub fn simulate_descriptor(
        &mut self,
        path: CharacteristicPath,
        uuid: Uuid,
        action: SimulationAction,
    ) -> Result<(), BridgeError> {
        let id = self.peek_id();
        let characteristic = self.characteristic_mut_or_err(&path)?;
        match action {
            SimulationAction::Add => {
                characteristic.descriptors.push(SimulatedDescriptor {
                    id,
                    uuid,
                    value: Vec::new(),
                });
                self.next_id += 1;
            }
            SimulationAction::Remove => {
                let index = characteristic
                    .descriptors
                    .iter()
                    .position(|d| d.uuid == uuid)
                    .ok_or_else(|| BridgeError::Configuration(format!("unknown descriptor {}", uuid)))?;
                characteristic.descriptors.remove(index);
            }
        }
        Ok(())
    }

    /// Replace a characteristic's value as if the peripheral changed it
    pub fn set_characteristic_value(
        &mut self,
        path: CharacteristicPath,
        value: Vec<u8>,
    ) -> Result<(), BridgeError> {
        let characteristic = self.characteristic_mut_or_err(&path)?;
        characteristic.value = value.clone();
        if characteristic.notifying {
            self.emit(SimulationEvent::CharacteristicValueChanged {
                address: path.address,
                uuid: path.characteristic,
                value,
            });
        }
        Ok(())
    }

    /// Drop every device and return the adapter to `absent`.
    ///
    /// The id counter keeps running so ids from before the reset never
    /// resolve again.
    pub fn reset(&mut self) {
        info!("Resetting simulation ({} devices)", self.devices.len());
        self.state = SimulatedAdapterState::Absent;
        self.devices.clear();
        self.allowed_services.clear();
        self.emit(SimulationEvent::SimulationReset);
    }

    // Web Bluetooth

    // https://webbluetoothcg.github.io/web-bluetooth/#dom-bluetooth-getavailability
    pub fn get_availability(&self) -> bool {
        self.state.availability()
    }

    fn require_powered(&self) -> BluetoothResult<()> {
        if self.state.is_powered() {
            Ok(())
        } else {
            Err(BluetoothError::NotFound("Bluetooth adapter not available.".to_string()))
        }
    }

    // https://webbluetoothcg.github.io/web-bluetooth/#request-bluetooth-devices
    pub fn request_device(&mut self, options: &RequestDeviceOptions) -> BluetoothResult<DeviceMsg> {
        options.validate()?;
        self.require_powered()?;

        // The chooser picks the first match
        let device = self
            .devices
            .iter()
            .filter(|d| d.discoverable)
            .find(|d| options.matches(d))
            .ok_or_else(|| BluetoothError::NotFound("User cancelled the requestDevice() chooser.".to_string()))?;

        let message = DeviceMsg {
            id: device.id,
            address: device.address,
            name: device.name.clone(),
        };
        self.allowed_services
            .entry(device.id)
            .or_default()
            .extend(options.services_set());
        debug!("requestDevice() selected {}", message.address);
        Ok(message)
    }

    fn device_by_id(&self, id: InstanceId) -> BluetoothResult<&SimulatedDevice> {
        self.devices
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| BluetoothError::Network("Bluetooth Device is no longer in range.".to_string()))
    }

    fn connected_device(&self, id: InstanceId) -> BluetoothResult<&SimulatedDevice> {
        let device = self.device_by_id(id)?;
        if !device.connected {
            return Err(BluetoothError::Network(
                "GATT Server is disconnected. Cannot perform GATT operations.".to_string(),
            ));
        }
        Ok(device)
    }

    // https://webbluetoothcg.github.io/web-bluetooth/#dom-bluetoothremotegattserver-connect
    pub fn gatt_connect(&mut self, device_id: InstanceId) -> BluetoothResult<()> {
        if !self.state.is_powered() {
            return Err(BluetoothError::Network("Bluetooth adapter is not powered.".to_string()));
        }
        let device = self
            .devices
            .iter_mut()
            .find(|d| d.id == device_id)
            .ok_or_else(|| BluetoothError::Network("Bluetooth Device is no longer in range.".to_string()))?;
        if device.connected {
            return Ok(());
        }
        device.connected = true;
        let address = device.address;
        debug!("GATT connected to {}", address);
        self.emit(SimulationEvent::GattConnected(address));
        Ok(())
    }

    pub fn gatt_disconnect(&mut self, device_id: InstanceId) -> BluetoothResult<()> {
        let device = self
            .devices
            .iter_mut()
            .find(|d| d.id == device_id)
            .ok_or_else(|| BluetoothError::Network("Bluetooth Device is no longer in range.".to_string()))?;
        if !device.connected {
            return Ok(());
        }
        device.connected = false;
        for service in &mut device.services {
            for characteristic in &mut service.characteristics {
                characteristic.notifying = false;
            }
        }
        let address = device.address;
        self.emit(SimulationEvent::GattDisconnected(address));
        Ok(())
    }

    pub fn is_connected(&self, device_id: InstanceId) -> bool {
        self.device_by_id(device_id).map_or(false, |d| d.connected)
    }

    // https://webbluetoothcg.github.io/web-bluetooth/#getgattchildren
    pub fn get_primary_services(
        &self,
        device_id: InstanceId,
        uuid: Option<Uuid>,
        single: bool,
    ) -> BluetoothResult<Vec<ServiceMsg>> {
        let device = self.connected_device(device_id)?;
        let allowed = self.allowed_services.get(&device_id);
        if let Some(uuid) = uuid {
            if !allowed.map_or(false, |s| s.contains(&uuid)) {
                return Err(BluetoothError::Security(format!(
                    "Origin is not allowed to access the service {}. Tip: Add the service UUID \
                     to 'optionalServices' in requestDevice() options.",
                    uuid
                )));
            }
        }

        let mut services: Vec<ServiceMsg> = device
            .services
            .iter()
            .filter(|s| uuid.map_or(true, |u| s.uuid == u))
            .filter(|s| allowed.map_or(false, |a| a.contains(&s.uuid)))
            .map(|s| ServiceMsg {
                id: s.id,
                device_id,
                uuid: s.uuid,
                is_primary: true,
            })
            .collect();

        if services.is_empty() {
            return Err(BluetoothError::NotFound(match uuid {
                Some(u) => format!("No Services matching UUID {} found in Device.", u),
                None => "No Services found in device.".to_string(),
            }));
        }
        if single {
            services.truncate(1);
        }
        Ok(services)
    }

    fn service_by_id(&self, service_id: InstanceId) -> BluetoothResult<(&SimulatedDevice, &SimulatedService)> {
        self.devices
            .iter()
            .find_map(|d| d.services.iter().find(|s| s.id == service_id).map(|s| (d, s)))
            .ok_or_else(|| {
                BluetoothError::InvalidState(
                    "GATT Service no longer exists. Remote device may have removed it.".to_string(),
                )
            })
    }

    pub fn get_characteristics(
        &self,
        service_id: InstanceId,
        uuid: Option<Uuid>,
        single: bool,
    ) -> BluetoothResult<Vec<CharacteristicMsg>> {
        let (device, service) = self.service_by_id(service_id)?;
        self.connected_device(device.id)?;

        let mut characteristics: Vec<CharacteristicMsg> = service
            .characteristics
            .iter()
            .filter(|c| uuid.map_or(true, |u| c.uuid == u))
            .map(|c| CharacteristicMsg {
                id: c.id,
                service_id,
                uuid: c.uuid,
                properties: c.properties,
            })
            .collect();

        if characteristics.is_empty() {
            return Err(BluetoothError::NotFound(match uuid {
                Some(u) => format!("No Characteristics matching UUID {} found in Service.", u),
                None => "No Characteristics found in service.".to_string(),
            }));
        }
        if single {
            characteristics.truncate(1);
        }
        Ok(characteristics)
    }

    fn characteristic_by_id(
        &self,
        characteristic_id: InstanceId,
    ) -> BluetoothResult<(&SimulatedDevice, &SimulatedCharacteristic)> {
        self.devices
            .iter()
            .find_map(|d| {
                d.services
                    .iter()
                    .flat_map(|s| s.characteristics.iter())
                    .find(|c| c.id == characteristic_id)
                    .map(|c| (d, c))
            })
            .ok_or_else(|| {
                BluetoothError::InvalidState(
                    "GATT Characteristic no longer exists. Remote device may have removed it."
                        .to_string(),
                )
            })
    }

    fn characteristic_by_id_mut(
        &mut self,
        characteristic_id: InstanceId,
    ) -> BluetoothResult<(DeviceAddress, bool, &mut SimulatedCharacteristic)> {
        self.devices
            .iter_mut()
            .find_map(|d| {
                let address = d.address;
                let connected = d.connected;
                d.services
                    .iter_mut()
                    .flat_map(|s| s.characteristics.iter_mut())
                    .find(|c| c.id == characteristic_id)
                    .map(|c| (address, connected, c))
            })
            .ok_or_else(|| {
                BluetoothError::InvalidState(
                    "GATT Characteristic no longer exists. Remote device may have removed it."
                        .to_string(),
                )
            })
    }

    pub fn get_descriptors(
        &self,
        characteristic_id: InstanceId,
        uuid: Option<Uuid>,
        single: bool,
    ) -> BluetoothResult<Vec<DescriptorMsg>> {
        let (device, characteristic) = self.characteristic_by_id(characteristic_id)?;
        self.connected_device(device.id)?;

        let mut descriptors: Vec<DescriptorMsg> = characteristic
            .descriptors
            .iter()
            .filter(|d| uuid.map_or(true, |u| d.uuid == u))
            .map(|d| DescriptorMsg {
                id: d.id,
                characteristic_id,
                uuid: d.uuid,
            })
            .collect();

        if descriptors.is_empty() {
            return Err(BluetoothError::NotFound(match uuid {
                Some(u) => format!("No Descriptors matching UUID {} found in Characteristic.", u),
                None => "No Descriptors found in Characteristic.".to_string(),
            }));
        }
        if single {
            descriptors.truncate(1);
        }
        Ok(descriptors)
    }

    // https://webbluetoothcg.github.io/web-bluetooth/#dom-bluetoothremotegattcharacteristic-readvalue
    pub fn read_characteristic(&self, characteristic_id: InstanceId) -> BluetoothResult<Vec<u8>> {
        let (device, characteristic) = self.characteristic_by_id(characteristic_id)?;
        self.connected_device(device.id)?;
        if !characteristic.properties.read() {
            return Err(BluetoothError::NotSupported(
                "GATT operation not permitted.".to_string(),
            ));
        }
        Ok(characteristic.value.clone())
    }

    // https://webbluetoothcg.github.io/web-bluetooth/#dom-bluetoothremotegattcharacteristic-writevalue
    pub fn write_characteristic(
        &mut self,
        characteristic_id: InstanceId,
        value: Vec<u8>,
        write_type: WriteType,
    ) -> BluetoothResult<()> {
        if value.len() > 512 {
            return Err(BluetoothError::InvalidState(
                "Value can't exceed 512 bytes.".to_string(),
            ));
        }
        let (address, connected, characteristic) = self.characteristic_by_id_mut(characteristic_id)?;
        if !connected {
            return Err(BluetoothError::Network(
                "GATT Server is disconnected. Cannot perform GATT operations.".to_string(),
            ));
        }
        if !write_type.permitted_by(&characteristic.properties) {
            return Err(BluetoothError::NotSupported(
                "GATT operation not permitted.".to_string(),
            ));
        }

        characteristic.value = value.clone();
        let uuid = characteristic.uuid;
        if characteristic.notifying {
            self.emit(SimulationEvent::CharacteristicValueChanged { address, uuid, value });
        }
        Ok(())
    }

    // https://webbluetoothcg.github.io/web-bluetooth/#dom-bluetoothremotegattcharacteristic-startnotifications
    pub fn set_notifications(&mut self, characteristic_id: InstanceId, enable: bool) -> BluetoothResult<()> {
        let (_, connected, characteristic) = self.characteristic_by_id_mut(characteristic_id)?;
        if !connected {
            return Err(BluetoothError::Network(
                "GATT Server is disconnected. Cannot perform GATT operations.".to_string(),
            ));
        }
        let props = characteristic.properties;
        if enable && !(props.notify() || props.indicate()) {
            return Err(BluetoothError::NotSupported(
                "GATT operation not permitted.".to_string(),
            ));
        }
        characteristic.notifying = enable;
        Ok(())
    }

    fn descriptor_by_id_mut(
        &mut self,
        descriptor_id: InstanceId,
    ) -> BluetoothResult<(bool, &mut SimulatedDescriptor)> {
        self.devices
            .iter_mut()
            .find_map(|d| {
                let connected = d.connected;
                d.services
                    .iter_mut()
                    .flat_map(|s| s.characteristics.iter_mut())
                    .flat_map(|c| c.descriptors.iter_mut())
                    .find(|desc| desc.id == descriptor_id)
                    .map(|desc| (connected, desc))
            })
            .ok_or_else(|| {
                BluetoothError::InvalidState(
                    "GATT Descriptor no longer exists. Remote device may have removed it."
                        .to_string(),
                )
            })
    }

    pub fn read_descriptor(&mut self, descriptor_id: InstanceId) -> BluetoothResult<Vec<u8>> {
        let (connected, descriptor) = self.descriptor_by_id_mut(descriptor_id)?;
        if !connected {
            return Err(BluetoothError::Network(
                "GATT Server is disconnected. Cannot perform GATT operations.".to_string(),
            ));
        }
        Ok(descriptor.value.clone())
    }

    pub fn write_descriptor(&mut self, descriptor_id: InstanceId, value: Vec<u8>) -> BluetoothResult<()> {
        if value.len() > 512 {
            return Err(BluetoothError::InvalidState(
                "Value can't exceed 512 bytes.".to_string(),
            ));
        }
        let (connected, descriptor) = self.descriptor_by_id_mut(descriptor_id)?;
        if !connected {
            return Err(BluetoothError::Network(
                "GATT Server is disconnected. Cannot perform GATT operations.".to_string(),
            ));
        }
        descriptor.value = value;
        Ok(())
    }

    /// Warn about anything still connected when a test tears down
    pub fn log_leftovers(&self) {
        for device in self.devices.iter().filter(|d| d.connected) {
            warn!("Peripheral {} still connected at teardown", device.address);
        }
    }
}
