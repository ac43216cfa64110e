//! Adapter power/presence state and the central configuration record

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// State of the simulated adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimulatedAdapterState {
    /// Radio present but switched off
    PoweredOff,
    /// Radio present and on
    PoweredOn,
    /// No Bluetooth LE support on the platform
    #[default]
    Absent,
}

impl SimulatedAdapterState {
    pub const ALL: [SimulatedAdapterState; 3] = [
        SimulatedAdapterState::PoweredOff,
        SimulatedAdapterState::PoweredOn,
        SimulatedAdapterState::Absent,
    ];

    /// Wire name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PoweredOff => "powered-off",
            Self::PoweredOn => "powered-on",
            Self::Absent => "absent",
        }
    }

    /// Whether the platform has an adapter at all
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }

    /// Whether the radio can scan and connect
    pub fn is_powered(&self) -> bool {
        matches!(self, Self::PoweredOn)
    }

    /// What `getAvailability()` reports for this state.
    ///
    /// A powered-off radio still counts as available: the platform supports
    /// Bluetooth LE, the user just has it switched off.
    pub fn availability(&self) -> bool {
        self.is_present()
    }
}

impl fmt::Display for SimulatedAdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimulatedAdapterState {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "powered-off" => Ok(Self::PoweredOff),
            "powered-on" => Ok(Self::PoweredOn),
            "absent" => Ok(Self::Absent),
            other => Err(BridgeError::Configuration(format!(
                "unrecognized adapter state '{}'",
                other
            ))),
        }
    }
}

/// Configuration passed to `simulate_central`.
///
/// The only recognized option is the adapter state, so a value of this type
/// is always valid once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CentralConfig {
    state: SimulatedAdapterState,
}

impl CentralConfig {
    pub fn new(state: SimulatedAdapterState) -> Self {
        Self { state }
    }

    /// Build from a state name such as `"powered-off"`
    pub fn from_state_name(name: &str) -> Result<Self, BridgeError> {
        Ok(Self::new(name.parse()?))
    }

    pub fn powered_on() -> Self {
        Self::new(SimulatedAdapterState::PoweredOn)
    }

    pub fn powered_off() -> Self {
        Self::new(SimulatedAdapterState::PoweredOff)
    }

    pub fn absent() -> Self {
        Self::new(SimulatedAdapterState::Absent)
    }

    pub fn state(&self) -> SimulatedAdapterState {
        self.state
    }
}
