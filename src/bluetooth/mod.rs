//! Web Bluetooth API surface served by the simulation
//!
//! This is what a conformance test calls after configuring the bridge:
//! `Bluetooth::get_availability`, `Bluetooth::request_device` and the GATT
//! objects reachable from the returned device.

pub mod gatt;
pub mod options;

use log::debug;

pub use gatt::{
    BluetoothDevice, RemoteGattCharacteristic, RemoteGattDescriptor, RemoteGattServer,
    RemoteGattService,
};
pub use options::{ManufacturerDataFilter, RequestDeviceOptions, ScanFilter};

use crate::error::Result;
use crate::simulation::SimulationHandle;

/// `navigator.bluetooth`
#[derive(Debug, Clone)]
pub struct Bluetooth {
    handle: SimulationHandle,
}

impl Bluetooth {
    pub fn new(handle: SimulationHandle) -> Self {
        Self { handle }
    }

    /// `true` when the platform has a Bluetooth LE adapter, powered or not
    pub async fn get_availability(&self) -> Result<bool> {
        let available = self.handle.get_availability().await?;
        debug!("getAvailability() -> {}", available);
        Ok(available)
    }

    /// Pick the first discoverable device matching `options`.
    ///
    /// The chooser is automatic: there is no user prompt to cancel.
    pub async fn request_device(&self, options: RequestDeviceOptions) -> Result<BluetoothDevice> {
        let device = self.handle.request_device(options).await?;
        Ok(BluetoothDevice::new(self.handle.clone(), device))
    }
}
