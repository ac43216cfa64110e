//! Bridge settings management

mod bridge_config;

pub use bridge_config::{BridgeConfig, DebugCategories, LogLevel};

/// Trait for components whose behaviour follows the bridge settings
pub trait Configurable {
    /// Apply configuration
    fn apply_config(&mut self, config: &BridgeConfig);
}
