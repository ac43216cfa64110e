//! JSON control protocol
//!
//! Commands arrive as `{"id": 1, "method": "bluetooth.simulateAdapter",
//! "params": {"state": "powered-off"}}` and are answered with a success or
//! error object carrying the same id. A malformed command yields an error
//! response and never tears down the session.

use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::bridge::FakeAdapterBridge;
use crate::error::{BridgeError, Result};
use crate::simulation::{
    CentralConfig, CharacteristicProperties, DeviceAddress, PeripheralConfig, Property,
    SimulatedAdapterState, SimulationAction,
};

/// Envelope of every command
#[derive(Debug, Deserialize)]
struct RawCommand {
    id: u64,
    method: String,
    #[serde(default)]
    params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulateAdapterParams {
    pub state: SimulatedAdapterState,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManufacturerData {
    pub key: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatePeripheralParams {
    pub address: DeviceAddress,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub manufacturer_data: Vec<ManufacturerData>,
    #[serde(default)]
    pub known_service_uuids: Vec<String>,
    #[serde(default = "default_discoverable")]
    pub discoverable: bool,
}

fn default_discoverable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulateServiceParams {
    pub address: DeviceAddress,
    pub uuid: String,
    #[serde(rename = "type")]
    pub action: SimulationAction,
}

/// `characteristicProperties`; missing flags are false
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertiesRecord {
    pub broadcast: bool,
    pub read: bool,
    pub write_without_response: bool,
    pub write: bool,
    pub notify: bool,
    pub indicate: bool,
    pub authenticated_signed_writes: bool,
    pub extended_properties: bool,
}

impl From<PropertiesRecord> for CharacteristicProperties {
    fn from(record: PropertiesRecord) -> Self {
        let flags = [
            (record.broadcast, Property::Broadcast),
            (record.read, Property::Read),
            (record.write_without_response, Property::WriteWithoutResponse),
            (record.write, Property::Write),
            (record.notify, Property::Notify),
            (record.indicate, Property::Indicate),
            (record.authenticated_signed_writes, Property::AuthenticatedSignedWrites),
            (record.extended_properties, Property::ExtendedProperties),
        ];
        flags
            .into_iter()
            .filter(|(set, _)| *set)
            .fold(CharacteristicProperties::empty(), |acc, (_, p)| acc | p.flag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateCharacteristicParams {
    pub address: DeviceAddress,
    pub service_uuid: String,
    pub characteristic_uuid: String,
    #[serde(default)]
    pub characteristic_properties: PropertiesRecord,
    #[serde(rename = "type")]
    pub action: SimulationAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateDescriptorParams {
    pub address: DeviceAddress,
    pub service_uuid: String,
    pub characteristic_uuid: String,
    pub descriptor_uuid: String,
    #[serde(rename = "type")]
    pub action: SimulationAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCharacteristicValueParams {
    pub address: DeviceAddress,
    pub service_uuid: String,
    pub characteristic_uuid: String,
    pub value: Vec<u8>,
}

/// A decoded control command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SimulateAdapter(SimulateAdapterParams),
    SimulatePreconnectedPeripheral(SimulatePeripheralParams),
    SimulateService(SimulateServiceParams),
    SimulateCharacteristic(SimulateCharacteristicParams),
    SimulateDescriptor(SimulateDescriptorParams),
    SetCharacteristicValue(SetCharacteristicValueParams),
    DisableSimulation,
}

impl Command {
    fn decode(method: &str, params: serde_json::Value) -> std::result::Result<Self, ProtocolFailure> {
        let invalid = |e: serde_json::Error| ProtocolFailure::InvalidArgument(e.to_string());
        Ok(match method {
            "bluetooth.simulateAdapter" => {
                Self::SimulateAdapter(serde_json::from_value(params).map_err(invalid)?)
            }
            "bluetooth.simulatePreconnectedPeripheral" => {
                Self::SimulatePreconnectedPeripheral(serde_json::from_value(params).map_err(invalid)?)
            }
            "bluetooth.simulateService" => {
                Self::SimulateService(serde_json::from_value(params).map_err(invalid)?)
            }
            "bluetooth.simulateCharacteristic" => {
                Self::SimulateCharacteristic(serde_json::from_value(params).map_err(invalid)?)
            }
            "bluetooth.simulateDescriptor" => {
                Self::SimulateDescriptor(serde_json::from_value(params).map_err(invalid)?)
            }
            "bluetooth.setCharacteristicValue" => {
                Self::SetCharacteristicValue(serde_json::from_value(params).map_err(invalid)?)
            }
            "bluetooth.disableSimulation" => Self::DisableSimulation,
            other => return Err(ProtocolFailure::UnknownCommand(other.to_string())),
        })
    }
}

#[derive(Debug)]
enum ProtocolFailure {
    InvalidArgument(String),
    UnknownCommand(String),
}

impl ProtocolFailure {
    fn into_parts(self) -> (&'static str, String) {
        match self {
            Self::InvalidArgument(message) => ("invalid argument", message),
            Self::UnknownCommand(method) => ("unknown command", format!("Unknown method '{}'", method)),
        }
    }
}

/// Reply to one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Response {
    Success {
        id: u64,
        result: serde_json::Map<String, serde_json::Value>,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        error: String,
        message: String,
    },
}

impl Response {
    fn success(id: u64) -> Self {
        Self::Success {
            id,
            result: serde_json::Map::new(),
        }
    }

    fn error(id: Option<u64>, error: &str, message: impl Into<String>) -> Self {
        Self::Error {
            id,
            error: error.to_string(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Applies control commands to one bridge
#[derive(Debug, Clone)]
pub struct ProtocolSession {
    bridge: FakeAdapterBridge,
}

impl ProtocolSession {
    pub fn new(bridge: FakeAdapterBridge) -> Self {
        Self { bridge }
    }

    /// Handle one JSON message and return the JSON reply
    pub async fn handle_message(&self, message: &str) -> String {
        let response = self.handle(message).await;
        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","error":"unknown error","message":"{}"}}"#,
                e.to_string().replace('"', "'")
            )
        })
    }

    pub async fn handle(&self, message: &str) -> Response {
        let raw: RawCommand = match serde_json::from_str(message) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Undecodable control message: {}", e);
                return Response::error(None, "invalid argument", e.to_string());
            }
        };

        let command = match Command::decode(&raw.method, raw.params) {
            Ok(command) => command,
            Err(failure) => {
                let (error, message) = failure.into_parts();
                warn!("Rejected command {}: {}", raw.id, message);
                return Response::error(Some(raw.id), error, message);
            }
        };

        debug!("Command {}: {:?}", raw.id, command);
        match self.execute(command).await {
            Ok(()) => Response::success(raw.id),
            Err(e) => Response::error(Some(raw.id), error_code(&e), e.to_string()),
        }
    }

    pub async fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::SimulateAdapter(params) => {
                self.bridge.simulate_central(CentralConfig::new(params.state)).await
            }
            Command::SimulatePreconnectedPeripheral(params) => {
                let mut config = PeripheralConfig::new(params.address);
                config.name = params.name;
                config.discoverable = params.discoverable;
                config.manufacturer_data = params
                    .manufacturer_data
                    .into_iter()
                    .map(|entry| (entry.key, entry.data))
                    .collect::<HashMap<_, _>>();
                for service in &params.known_service_uuids {
                    config = config.with_known_service(crate::bridge::resolve_uuid(
                        crate::simulation::uuids::AttributeKind::Service,
                        service,
                    )?);
                }
                self.bridge.simulate_peripheral(config).await.map(|_| ())
            }
            Command::SimulateService(params) => {
                self.bridge
                    .simulate_service(params.address, &params.uuid, params.action)
                    .await
            }
            Command::SimulateCharacteristic(params) => {
                self.bridge
                    .simulate_characteristic(
                        params.address,
                        &params.service_uuid,
                        &params.characteristic_uuid,
                        params.characteristic_properties.into(),
                        params.action,
                    )
                    .await
            }
            Command::SimulateDescriptor(params) => {
                self.bridge
                    .simulate_descriptor(
                        params.address,
                        &params.service_uuid,
                        &params.characteristic_uuid,
                        &params.descriptor_uuid,
                        params.action,
                    )
                    .await
            }
            Command::SetCharacteristicValue(params) => {
                self.bridge
                    .set_characteristic_value(
                        params.address,
                        &params.service_uuid,
                        &params.characteristic_uuid,
                        &params.value,
                    )
                    .await
            }
            Command::DisableSimulation => self.bridge.reset().await,
        }
    }
}

fn error_code(error: &BridgeError) -> &'static str {
    match error {
        BridgeError::Configuration(_) | BridgeError::Config(_) => "invalid argument",
        BridgeError::ChannelClosed => "no such frame",
        _ => "unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::simulation::Simulation;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_decode_characteristic_command() {
        let params = json!({
            "address": "09:09:09:09:09:09",
            "serviceUuid": "health_thermometer",
            "characteristicUuid": "measurement_interval",
            "characteristicProperties": {"read": true, "write": true, "indicate": true},
            "type": "add"
        });
        let command = Command::decode("bluetooth.simulateCharacteristic", params).unwrap();
        let Command::SimulateCharacteristic(params) = command else {
            panic!("wrong command decoded");
        };
        assert_eq!(params.action, SimulationAction::Add);
        assert_eq!(
            CharacteristicProperties::from(params.characteristic_properties),
            CharacteristicProperties::READ | CharacteristicProperties::WRITE | CharacteristicProperties::INDICATE
        );
    }

    #[test]
    fn test_success_response_shape() {
        let value = serde_json::to_value(Response::success(4)).unwrap();
        assert_eq!(value, json!({"type": "success", "id": 4, "result": {}}));
    }

    #[tokio::test]
    async fn test_session_applies_commands() {
        let simulation = Simulation::start(&BridgeConfig::default());
        let session = ProtocolSession::new(simulation.bridge());
        let bluetooth = simulation.bluetooth();

        let reply = session
            .handle(r#"{"id": 1, "method": "bluetooth.simulateAdapter", "params": {"state": "powered-off"}}"#)
            .await;
        assert_eq!(reply, Response::success(1));
        assert!(bluetooth.get_availability().await.unwrap());

        let reply = session
            .handle(r#"{"id": 2, "method": "bluetooth.disableSimulation"}"#)
            .await;
        assert!(reply.is_success());
        assert!(!bluetooth.get_availability().await.unwrap());

        simulation.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_commands_yield_errors() {
        let simulation = Simulation::start(&BridgeConfig::default());
        let session = ProtocolSession::new(simulation.bridge());

        let unknown: serde_json::Value = serde_json::from_str(
            &session.handle_message(r#"{"id": 3, "method": "bluetooth.fly", "params": {}}"#).await,
        )
        .unwrap();
        assert_eq!(unknown["type"], "error");
        assert_eq!(unknown["error"], "unknown command");
        assert_eq!(unknown["id"], 3);

        let bad_state = session
            .handle(r#"{"id": 4, "method": "bluetooth.simulateAdapter", "params": {"state": "on"}}"#)
            .await;
        assert!(matches!(bad_state, Response::Error { ref error, .. } if error == "invalid argument"));

        let garbage = session.handle("not json").await;
        assert!(matches!(garbage, Response::Error { id: None, .. }));

        let no_adapter = session
            .handle(
                r#"{"id": 5, "method": "bluetooth.simulateService",
                    "params": {"address": "01:02:03:04:05:06", "uuid": "heart_rate", "type": "add"}}"#,
            )
            .await;
        assert!(!no_adapter.is_success());

        simulation.shutdown().await.unwrap();
    }
}
