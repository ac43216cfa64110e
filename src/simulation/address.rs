//! Bluetooth device address of a simulated peripheral

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BridgeError;

/// A 48-bit device address, most significant byte first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for DeviceAddress {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(BridgeError::Configuration(format!("invalid device address '{}'", s)));
        }

        let mut addr = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(BridgeError::Configuration(format!("invalid device address '{}'", s)));
            }
            addr[i] = u8::from_str_radix(part, 16).map_err(|e| {
                BridgeError::Configuration(format!("invalid hex byte '{}' in '{}': {}", part, s, e))
            })?;
        }
        Ok(Self(addr))
    }
}

impl Serialize for DeviceAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DeviceAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let addr_str = String::deserialize(deserializer)?;
        addr_str.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let addr: DeviceAddress = "09:09:09:09:09:0a".parse().unwrap();
        assert_eq!(addr.bytes(), [9, 9, 9, 9, 9, 10]);
        assert_eq!(addr.to_string(), "09:09:09:09:09:0A");
    }

    #[test]
    fn test_invalid_addresses() {
        assert!("09:09:09".parse::<DeviceAddress>().is_err());
        assert!("09:09:09:09:09:zz".parse::<DeviceAddress>().is_err());
        assert!("0909:09:09:09:09".parse::<DeviceAddress>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let addr = DeviceAddress::new([0, 0, 0, 0, 0, 3]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"00:00:00:00:00:03\"");
        let back: DeviceAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
