//! Simulated Bluetooth backend
//!
//! The data model, the `FakeCentral` state machine and the task that serves
//! it to the bridge and the Web Bluetooth objects.

pub mod address;
pub mod central;
pub mod device;
pub mod events;
pub mod manager;
pub mod properties;
pub mod state;
pub mod uuids;

pub use address::DeviceAddress;
pub use central::{CharacteristicPath, FakeCentral};
pub use device::{InstanceId, PeripheralConfig, SimulationAction};
pub use events::{EventBroker, EventFilter, EventType, SimulationEvent};
pub use manager::{CentralController, Simulation, SimulationHandle};
pub use properties::{CharacteristicProperties, Property, TestCharacteristicProperties, WriteType};
pub use state::{CentralConfig, SimulatedAdapterState};
