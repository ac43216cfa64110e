//! Error types for the fake adapter bridge

use std::time::Duration;
use thiserror::Error;

/// Rejection raised by the Web Bluetooth API surface.
///
/// The variants follow the DOMException names a page would observe.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BluetoothError {
    /// NotFoundError
    #[error("NotFoundError: {0}")]
    NotFound(String),

    /// InvalidStateError
    #[error("InvalidStateError: {0}")]
    InvalidState(String),

    /// NetworkError
    #[error("NetworkError: {0}")]
    Network(String),

    /// NotSupportedError
    #[error("NotSupportedError: {0}")]
    NotSupported(String),

    /// SecurityError
    #[error("SecurityError: {0}")]
    Security(String),

    /// TypeError
    #[error("TypeError: {0}")]
    Type(String),
}

impl BluetoothError {
    /// The DOMException name of this error
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFoundError",
            Self::InvalidState(_) => "InvalidStateError",
            Self::Network(_) => "NetworkError",
            Self::NotSupported(_) => "NotSupportedError",
            Self::Security(_) => "SecurityError",
            Self::Type(_) => "TypeError",
        }
    }
}

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read or written
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for this schema
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Error type of the bridge and the harness built on it
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The simulation backend rejected a configuration command
    #[error("Simulation configuration failed: {0}")]
    Configuration(String),

    /// An actual value did not match the expected one
    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// A test body ran past its deadline
    #[error("Test timed out after {0:?}")]
    Timeout(Duration),

    /// A Web Bluetooth call was rejected
    #[error(transparent)]
    Bluetooth(#[from] BluetoothError),

    /// The simulation task is gone
    #[error("Simulation channel closed")]
    ChannelClosed,

    /// A control protocol message could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Result type alias for the Web Bluetooth API surface
pub type BluetoothResult<T> = std::result::Result<T, BluetoothError>;

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for BridgeError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::ChannelClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for BridgeError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::ChannelClosed
    }
}
