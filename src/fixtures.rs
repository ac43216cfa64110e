//! Canonical fake devices used by the conformance scenarios
//!
//! Each fixture provisions its device through the bridge, then walks the
//! same `requestDevice()` / `connect()` / discovery path a page would.

use log::debug;

use crate::bluetooth::{
    Bluetooth, BluetoothDevice, RemoteGattServer, RemoteGattService, RequestDeviceOptions,
    ScanFilter,
};
use crate::bridge::FakeAdapterBridge;
use crate::error::{BridgeError, Result};
use crate::simulation::{
    CentralConfig, CharacteristicProperties, DeviceAddress, SimulationAction,
};

pub const HEALTH_THERMOMETER_ADDRESS: DeviceAddress = DeviceAddress::new([0x09; 6]);
pub const HEALTH_THERMOMETER_NAME: &str = "Health Thermometer";
pub const HEART_RATE_ADDRESS: DeviceAddress = DeviceAddress::new([0x08; 6]);
pub const HEART_RATE_NAME: &str = "Heart Rate Device";

/// Measurement interval in seconds, little endian
pub const MEASUREMENT_INTERVAL_VALUE: [u8; 2] = [0x01, 0x00];
/// Body temperature type "Body (general)"
pub const TEMPERATURE_TYPE_VALUE: [u8; 1] = [0x02];
/// Body sensor location "Chest"
pub const BODY_SENSOR_LOCATION_VALUE: [u8; 1] = [0x01];

/// A device with a connected GATT server
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub device: BluetoothDevice,
    pub server: RemoteGattServer,
}

/// A discovered service together with the device it lives on
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub device: BluetoothDevice,
    pub service: RemoteGattService,
}

fn read_write_indicate() -> CharacteristicProperties {
    CharacteristicProperties::READ | CharacteristicProperties::WRITE | CharacteristicProperties::INDICATE
}

/// Provision the health thermometer without requesting it
pub async fn setup_health_thermometer(bridge: &FakeAdapterBridge) -> Result<()> {
    let address = HEALTH_THERMOMETER_ADDRESS;
    bridge.simulate_central(CentralConfig::powered_on()).await?;
    bridge
        .simulate_preconnected_peripheral(
            &address.to_string(),
            Some(HEALTH_THERMOMETER_NAME),
            &["generic_access", "health_thermometer"],
        )
        .await?;

    bridge
        .simulate_service(address, "generic_access", SimulationAction::Add)
        .await?;
    bridge
        .simulate_characteristic(
            address,
            "generic_access",
            "gap.device_name",
            CharacteristicProperties::READ,
            SimulationAction::Add,
        )
        .await?;
    bridge
        .set_characteristic_value(
            address,
            "generic_access",
            "gap.device_name",
            HEALTH_THERMOMETER_NAME.as_bytes(),
        )
        .await?;

    bridge
        .simulate_service(address, "health_thermometer", SimulationAction::Add)
        .await?;
    bridge
        .simulate_characteristic(
            address,
            "health_thermometer",
            "measurement_interval",
            read_write_indicate(),
            SimulationAction::Add,
        )
        .await?;
    bridge
        .set_characteristic_value(
            address,
            "health_thermometer",
            "measurement_interval",
            &MEASUREMENT_INTERVAL_VALUE,
        )
        .await?;
    for descriptor in [
        "gatt.characteristic_user_description",
        "gatt.client_characteristic_configuration",
    ] {
        bridge
            .simulate_descriptor(
                address,
                "health_thermometer",
                "measurement_interval",
                descriptor,
                SimulationAction::Add,
            )
            .await?;
    }

    bridge
        .simulate_characteristic(
            address,
            "health_thermometer",
            "temperature_measurement",
            CharacteristicProperties::INDICATE,
            SimulationAction::Add,
        )
        .await?;
    bridge
        .simulate_characteristic(
            address,
            "health_thermometer",
            "temperature_type",
            CharacteristicProperties::READ,
            SimulationAction::Add,
        )
        .await?;
    bridge
        .set_characteristic_value(
            address,
            "health_thermometer",
            "temperature_type",
            &TEMPERATURE_TYPE_VALUE,
        )
        .await?;

    debug!("Provisioned health thermometer at {}", address);
    Ok(())
}

/// Provision a heart rate monitor without requesting it
pub async fn setup_heart_rate(bridge: &FakeAdapterBridge) -> Result<()> {
    let address = HEART_RATE_ADDRESS;
    bridge.simulate_central(CentralConfig::powered_on()).await?;
    bridge
        .simulate_preconnected_peripheral(
            &address.to_string(),
            Some(HEART_RATE_NAME),
            &["generic_access", "heart_rate"],
        )
        .await?;
    bridge
        .simulate_service(address, "heart_rate", SimulationAction::Add)
        .await?;
    bridge
        .simulate_characteristic(
            address,
            "heart_rate",
            "heart_rate_measurement",
            CharacteristicProperties::NOTIFY,
            SimulationAction::Add,
        )
        .await?;
    bridge
        .simulate_characteristic(
            address,
            "heart_rate",
            "body_sensor_location",
            CharacteristicProperties::READ,
            SimulationAction::Add,
        )
        .await?;
    bridge
        .set_characteristic_value(
            address,
            "heart_rate",
            "body_sensor_location",
            &BODY_SENSOR_LOCATION_VALUE,
        )
        .await
}

async fn request_and_connect(
    bluetooth: &Bluetooth,
    options: RequestDeviceOptions,
) -> Result<DeviceContext> {
    let device = bluetooth.request_device(options).await?;
    let server = device.gatt().connect().await?;
    Ok(DeviceContext { device, server })
}

/// Provision the health thermometer, request it and connect
pub async fn get_health_thermometer_device(
    bridge: &FakeAdapterBridge,
    bluetooth: &Bluetooth,
) -> Result<DeviceContext> {
    setup_health_thermometer(bridge).await?;
    let options = RequestDeviceOptions::new()
        .with_filter(ScanFilter::new().with_services(&["health_thermometer"])?)
        .with_optional_services(&["generic_access"])?;
    request_and_connect(bluetooth, options).await
}

/// The connected health thermometer's `health_thermometer` service
pub async fn get_health_thermometer_service(
    bridge: &FakeAdapterBridge,
    bluetooth: &Bluetooth,
) -> Result<ServiceContext> {
    let DeviceContext { device, server } = get_health_thermometer_device(bridge, bluetooth).await?;
    let service = server.get_primary_service("health_thermometer").await?;
    Ok(ServiceContext { device, service })
}

/// The connected heart rate monitor's `heart_rate` service
pub async fn get_heart_rate_service(
    bridge: &FakeAdapterBridge,
    bluetooth: &Bluetooth,
) -> Result<ServiceContext> {
    setup_heart_rate(bridge).await?;
    let options = RequestDeviceOptions::new()
        .with_filter(ScanFilter::new().with_services(&["heart_rate"])?);
    let DeviceContext { device, server } = request_and_connect(bluetooth, options).await?;
    let service = server.get_primary_service("heart_rate").await?;
    Ok(ServiceContext { device, service })
}

/// Check a service handle belongs to the expected device
pub fn expect_device(context: &ServiceContext, address: DeviceAddress) -> Result<()> {
    if context.device.address() != address {
        return Err(BridgeError::Assertion(format!(
            "service belongs to {}, expected {}",
            context.device.address(),
            address
        )));
    }
    Ok(())
}
