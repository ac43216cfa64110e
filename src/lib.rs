//! Fake adapter bridge for Web Bluetooth conformance testing
//!
//! A test configures a simulated adapter through [`FakeAdapterBridge`] and
//! then exercises the Web Bluetooth API through [`Bluetooth`], which is
//! served by the simulation instead of real hardware.

pub mod bluetooth;
pub mod bridge;
pub mod config;
pub mod conformance;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod logging;
pub mod protocol;
pub mod simulation;

// Re-exports for convenience
pub use bluetooth::{Bluetooth, RequestDeviceOptions, ScanFilter};
pub use bridge::FakeAdapterBridge;
pub use config::{BridgeConfig, Configurable};
pub use error::{BluetoothError, BridgeError, Result};
pub use harness::{bluetooth_test, bluetooth_test_long, TestContext, TestHarness, TestReport};
pub use logging::init_logger;
pub use protocol::ProtocolSession;
pub use simulation::{
    CentralConfig, CharacteristicProperties, SimulatedAdapterState, Simulation,
    TestCharacteristicProperties,
};
