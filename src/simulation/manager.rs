//! The simulation actor.
//!
//! A `Simulation` owns one `FakeCentral` inside a spawned task. The bridge
//! and the Web Bluetooth objects talk to it through a `SimulationHandle`,
//! so every request is applied in the order it arrives.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::address::DeviceAddress;
use super::central::{
    CharacteristicMsg, CharacteristicPath, DescriptorMsg, DeviceMsg, FakeCentral, ServiceMsg,
};
use super::device::{InstanceId, PeripheralConfig, SimulationAction};
use super::events::{EventBroker, EventFilter, SimulationEvent};
use super::properties::{CharacteristicProperties, WriteType};
use super::state::CentralConfig;
use crate::bluetooth::options::RequestDeviceOptions;
use crate::bluetooth::Bluetooth;
use crate::bridge::FakeAdapterBridge;
use crate::config::BridgeConfig;
use crate::error::{BluetoothResult, BridgeError, Result};

type Reply<T> = oneshot::Sender<T>;

/// Requests served by the simulation task
#[derive(Debug)]
pub enum SimulationRequest {
    SimulateCentral(CentralConfig, Reply<()>),
    SimulatePeripheral(PeripheralConfig, Reply<Result<InstanceId>>),
    SimulateService(DeviceAddress, Uuid, SimulationAction, Reply<Result<()>>),
    SimulateCharacteristic(
        CharacteristicPath,
        CharacteristicProperties,
        SimulationAction,
        Reply<Result<()>>,
    ),
    SimulateDescriptor(CharacteristicPath, Uuid, SimulationAction, Reply<Result<()>>),
    SetCharacteristicValue(CharacteristicPath, Vec<u8>, Reply<Result<()>>),
    Reset(Reply<()>),

    GetAvailability(Reply<bool>),
    RequestDevice(RequestDeviceOptions, Reply<BluetoothResult<DeviceMsg>>),
    GattConnect(InstanceId, Reply<BluetoothResult<()>>),
    GattDisconnect(InstanceId, Reply<BluetoothResult<()>>),
    IsConnected(InstanceId, Reply<bool>),
    GetPrimaryServices(InstanceId, Option<Uuid>, bool, Reply<BluetoothResult<Vec<ServiceMsg>>>),
    GetCharacteristics(
        InstanceId,
        Option<Uuid>,
        bool,
        Reply<BluetoothResult<Vec<CharacteristicMsg>>>,
    ),
    GetDescriptors(InstanceId, Option<Uuid>, bool, Reply<BluetoothResult<Vec<DescriptorMsg>>>),
    ReadValue(InstanceId, Reply<BluetoothResult<Vec<u8>>>),
    WriteValue(InstanceId, Vec<u8>, WriteType, Reply<BluetoothResult<()>>),
    SetNotifications(InstanceId, bool, Reply<BluetoothResult<()>>),
    ReadDescriptor(InstanceId, Reply<BluetoothResult<Vec<u8>>>),
    WriteDescriptor(InstanceId, Vec<u8>, Reply<BluetoothResult<()>>),

    Exit,
}

/// Control plane of a simulation.
///
/// Implemented by `SimulationHandle`; the bridge only depends on this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CentralController: Send + Sync {
    async fn simulate_central(&self, config: CentralConfig) -> Result<()>;

    async fn simulate_preconnected_peripheral(&self, config: PeripheralConfig) -> Result<InstanceId>;

    async fn simulate_service(
        &self,
        address: DeviceAddress,
        uuid: Uuid,
        action: SimulationAction,
    ) -> Result<()>;

    async fn simulate_characteristic(
        &self,
        path: CharacteristicPath,
        properties: CharacteristicProperties,
        action: SimulationAction,
    ) -> Result<()>;

    async fn simulate_descriptor(
        &self,
        path: CharacteristicPath,
        uuid: Uuid,
        action: SimulationAction,
    ) -> Result<()>;

    async fn set_characteristic_value(&self, path: CharacteristicPath, value: Vec<u8>) -> Result<()>;

    /// Drop all simulated state and return the adapter to `absent`
    async fn reset(&self) -> Result<()>;
}

/// Cloneable sender side of a running simulation
#[derive(Debug, Clone)]
pub struct SimulationHandle {
    sender: Sender<SimulationRequest>,
}

impl SimulationHandle {
    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> SimulationRequest) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(make(tx)).await?;
        Ok(rx.await?)
    }

    pub async fn get_availability(&self) -> Result<bool> {
        self.call(SimulationRequest::GetAvailability).await
    }

    pub async fn request_device(&self, options: RequestDeviceOptions) -> Result<DeviceMsg> {
        Ok(self.call(|tx| SimulationRequest::RequestDevice(options, tx)).await??)
    }

    pub async fn gatt_connect(&self, device: InstanceId) -> Result<()> {
        Ok(self.call(|tx| SimulationRequest::GattConnect(device, tx)).await??)
    }

    pub async fn gatt_disconnect(&self, device: InstanceId) -> Result<()> {
        Ok(self.call(|tx| SimulationRequest::GattDisconnect(device, tx)).await??)
    }

    pub async fn is_connected(&self, device: InstanceId) -> Result<bool> {
        self.call(|tx| SimulationRequest::IsConnected(device, tx)).await
    }

    pub async fn get_primary_services(
        &self,
        device: InstanceId,
        uuid: Option<Uuid>,
        single: bool,
    ) -> Result<Vec<ServiceMsg>> {
        Ok(self
            .call(|tx| SimulationRequest::GetPrimaryServices(device, uuid, single, tx))
            .await??)
    }

    pub async fn get_characteristics(
        &self,
        service: InstanceId,
        uuid: Option<Uuid>,
        single: bool,
    ) -> Result<Vec<CharacteristicMsg>> {
        Ok(self
            .call(|tx| SimulationRequest::GetCharacteristics(service, uuid, single, tx))
            .await??)
    }

    pub async fn get_descriptors(
        &self,
        characteristic: InstanceId,
        uuid: Option<Uuid>,
        single: bool,
    ) -> Result<Vec<DescriptorMsg>> {
        Ok(self
            .call(|tx| SimulationRequest::GetDescriptors(characteristic, uuid, single, tx))
            .await??)
    }

    pub async fn read_value(&self, characteristic: InstanceId) -> Result<Vec<u8>> {
        Ok(self.call(|tx| SimulationRequest::ReadValue(characteristic, tx)).await??)
    }

    pub async fn write_value(
        &self,
        characteristic: InstanceId,
        value: Vec<u8>,
        write_type: WriteType,
    ) -> Result<()> {
        Ok(self
            .call(|tx| SimulationRequest::WriteValue(characteristic, value, write_type, tx))
            .await??)
    }

    pub async fn set_notifications(&self, characteristic: InstanceId, enable: bool) -> Result<()> {
        Ok(self
            .call(|tx| SimulationRequest::SetNotifications(characteristic, enable, tx))
            .await??)
    }

    pub async fn read_descriptor(&self, descriptor: InstanceId) -> Result<Vec<u8>> {
        Ok(self.call(|tx| SimulationRequest::ReadDescriptor(descriptor, tx)).await??)
    }

    pub async fn write_descriptor(&self, descriptor: InstanceId, value: Vec<u8>) -> Result<()> {
        Ok(self
            .call(|tx| SimulationRequest::WriteDescriptor(descriptor, value, tx))
            .await??)
    }
}

#[async_trait]
impl CentralController for SimulationHandle {
    async fn simulate_central(&self, config: CentralConfig) -> Result<()> {
        self.call(|tx| SimulationRequest::SimulateCentral(config, tx)).await
    }

    async fn simulate_preconnected_peripheral(&self, config: PeripheralConfig) -> Result<InstanceId> {
        self.call(|tx| SimulationRequest::SimulatePeripheral(config, tx)).await?
    }

    async fn simulate_service(
        &self,
        address: DeviceAddress,
        uuid: Uuid,
        action: SimulationAction,
    ) -> Result<()> {
        self.call(|tx| SimulationRequest::SimulateService(address, uuid, action, tx))
            .await?
    }

    async fn simulate_characteristic(
        &self,
        path: CharacteristicPath,
        properties: CharacteristicProperties,
        action: SimulationAction,
    ) -> Result<()> {
        self.call(|tx| SimulationRequest::SimulateCharacteristic(path, properties, action, tx))
            .await?
    }

    async fn simulate_descriptor(
        &self,
        path: CharacteristicPath,
        uuid: Uuid,
        action: SimulationAction,
    ) -> Result<()> {
        self.call(|tx| SimulationRequest::SimulateDescriptor(path, uuid, action, tx))
            .await?
    }

    async fn set_characteristic_value(&self, path: CharacteristicPath, value: Vec<u8>) -> Result<()> {
        self.call(|tx| SimulationRequest::SetCharacteristicValue(path, value, tx))
            .await?
    }

    async fn reset(&self) -> Result<()> {
        self.call(SimulationRequest::Reset).await
    }
}

fn handle_request(central: &mut FakeCentral, request: SimulationRequest) {
    use SimulationRequest::*;

    // A dropped receiver means the caller gave up; nothing to do about it here.
    match request {
        SimulateCentral(config, tx) => {
            central.simulate_central(config);
            let _ = tx.send(());
        }
        SimulatePeripheral(config, tx) => {
            let _ = tx.send(central.simulate_preconnected_peripheral(config));
        }
        SimulateService(address, uuid, action, tx) => {
            let _ = tx.send(central.simulate_service(address, uuid, action));
        }
        SimulateCharacteristic(path, properties, action, tx) => {
            let _ = tx.send(central.simulate_characteristic(path, properties, action));
        }
        SimulateDescriptor(path, uuid, action, tx) => {
            let _ = tx.send(central.simulate_descriptor(path, uuid, action));
        }
        SetCharacteristicValue(path, value, tx) => {
            let _ = tx.send(central.set_characteristic_value(path, value));
        }
        Reset(tx) => {
            central.reset();
            let _ = tx.send(());
        }
        GetAvailability(tx) => {
            let _ = tx.send(central.get_availability());
        }
        RequestDevice(options, tx) => {
            let _ = tx.send(central.request_device(&options));
        }
        GattConnect(id, tx) => {
            let _ = tx.send(central.gatt_connect(id));
        }
        GattDisconnect(id, tx) => {
            let _ = tx.send(central.gatt_disconnect(id));
        }
        IsConnected(id, tx) => {
            let _ = tx.send(central.is_connected(id));
        }
        GetPrimaryServices(id, uuid, single, tx) => {
            let _ = tx.send(central.get_primary_services(id, uuid, single));
        }
        GetCharacteristics(id, uuid, single, tx) => {
            let _ = tx.send(central.get_characteristics(id, uuid, single));
        }
        GetDescriptors(id, uuid, single, tx) => {
            let _ = tx.send(central.get_descriptors(id, uuid, single));
        }
        ReadValue(id, tx) => {
            let _ = tx.send(central.read_characteristic(id));
        }
        WriteValue(id, value, write_type, tx) => {
            let _ = tx.send(central.write_characteristic(id, value, write_type));
        }
        SetNotifications(id, enable, tx) => {
            let _ = tx.send(central.set_notifications(id, enable));
        }
        ReadDescriptor(id, tx) => {
            let _ = tx.send(central.read_descriptor(id));
        }
        WriteDescriptor(id, value, tx) => {
            let _ = tx.send(central.write_descriptor(id, value));
        }
        Exit => {}
    }
}

async fn run(mut central: FakeCentral, mut receiver: Receiver<SimulationRequest>) {
    while let Some(request) = receiver.recv().await {
        if matches!(request, SimulationRequest::Exit) {
            break;
        }
        debug!("Simulation request: {:?}", request);
        handle_request(&mut central, request);
    }
    central.log_leftovers();
    debug!("Simulation task stopped");
}

/// One independent simulation instance
pub struct Simulation {
    handle: SimulationHandle,
    broker: EventBroker,
    task: Option<JoinHandle<()>>,
}

impl Simulation {
    /// Spawn a fresh simulation with the adapter `absent`
    pub fn start(config: &BridgeConfig) -> Self {
        let mut broker = EventBroker::new(config.event_buffer);
        broker.start();

        let (sender, receiver) = mpsc::channel(config.channel_capacity);
        let central = FakeCentral::new().with_events(broker.get_sender());
        let task = tokio::spawn(run(central, receiver));
        info!("Started simulation");

        Self {
            handle: SimulationHandle { sender },
            broker,
            task: Some(task),
        }
    }

    pub fn handle(&self) -> SimulationHandle {
        self.handle.clone()
    }

    pub fn bridge(&self) -> FakeAdapterBridge {
        FakeAdapterBridge::new(Arc::new(self.handle.clone()))
    }

    pub fn bluetooth(&self) -> Bluetooth {
        Bluetooth::new(self.handle.clone())
    }

    /// A broker clone sharing this simulation's subscribers
    pub fn events(&self) -> EventBroker {
        self.broker.clone()
    }

    pub fn subscribe(&self, filter: EventFilter) -> Receiver<SimulationEvent> {
        self.broker.subscribe(filter).1
    }

    /// Same as [`Simulation::subscribe`], as a `Stream`
    pub fn event_stream(&self, filter: EventFilter) -> ReceiverStream<SimulationEvent> {
        ReceiverStream::new(self.subscribe(filter))
    }

    /// Stop the simulation task and close all event subscriptions
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            if self.handle.sender.send(SimulationRequest::Exit).await.is_err() {
                warn!("Simulation task already stopped");
            }
            task.await.map_err(|e| BridgeError::Configuration(format!("simulation task failed: {}", e)))?;
        }
        self.broker.shutdown();
        Ok(())
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::uuids::canonical_uuid;

    #[tokio::test]
    async fn test_state_round_trip_through_actor() {
        let simulation = Simulation::start(&BridgeConfig::default());
        let handle = simulation.handle();

        assert!(!handle.get_availability().await.unwrap());
        handle.simulate_central(CentralConfig::powered_off()).await.unwrap();
        assert!(handle.get_availability().await.unwrap());

        simulation.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_configuration_errors_are_returned() {
        let simulation = Simulation::start(&BridgeConfig::default());
        let handle = simulation.handle();

        let err = handle
            .simulate_service(DeviceAddress::new([1; 6]), canonical_uuid(0x1809), SimulationAction::Add)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));

        simulation.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_api_rejection_is_bluetooth_error() {
        let simulation = Simulation::start(&BridgeConfig::default());
        let handle = simulation.handle();

        let err = handle
            .request_device(RequestDeviceOptions::accept_all_devices())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Bluetooth(ref e) if e.name() == "NotFoundError"));

        simulation.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_events_published() {
        let simulation = Simulation::start(&BridgeConfig::default());
        let mut events = simulation.subscribe(EventFilter::all());

        simulation
            .handle()
            .simulate_central(CentralConfig::powered_on())
            .await
            .unwrap();
        assert_eq!(
            events.recv().await,
            Some(SimulationEvent::AdapterStateChanged(
                crate::simulation::state::SimulatedAdapterState::PoweredOn
            ))
        );

        simulation.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_event_stream_ends_on_shutdown() {
        use tokio_stream::StreamExt;

        let simulation = Simulation::start(&BridgeConfig::default());
        let mut stream = simulation.event_stream(EventFilter::all());
        simulation.handle().reset().await.unwrap();

        assert_eq!(stream.next().await, Some(SimulationEvent::SimulationReset));
        simulation.shutdown().await.unwrap();
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_handle_fails_after_shutdown() {
        let simulation = Simulation::start(&BridgeConfig::default());
        let handle = simulation.handle();
        simulation.shutdown().await.unwrap();

        assert!(matches!(
            handle.get_availability().await,
            Err(BridgeError::ChannelClosed)
        ));
    }
}
