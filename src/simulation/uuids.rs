//! Resolution of GATT attribute names and 16-bit aliases to full UUIDs

use uuid::Uuid;

use crate::error::BluetoothError;

/// The Bluetooth Base UUID, `00000000-0000-1000-8000-00805f9b34fb`
const BASE_UUID: u128 = 0x00000000_0000_1000_8000_0080_5F9B_34FB;

/// Full UUID for a 16- or 32-bit alias
pub const fn canonical_uuid(alias: u32) -> Uuid {
    Uuid::from_u128(BASE_UUID + ((alias as u128) << 96))
}

/// The 16-bit alias of `uuid`, if it is built on the base UUID
pub fn short_alias(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    if value & ((1u128 << 96) - 1) != BASE_UUID {
        return None;
    }
    u16::try_from(value >> 96).ok()
}

/// Which assigned-number table a name is looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Service,
    Characteristic,
    Descriptor,
}

impl AttributeKind {
    fn table(&self) -> &'static [(&'static str, u16)] {
        match self {
            Self::Service => SERVICES,
            Self::Characteristic => CHARACTERISTICS,
            Self::Descriptor => DESCRIPTORS,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Characteristic => "characteristic",
            Self::Descriptor => "descriptor",
        }
    }
}

const SERVICES: &[(&str, u16)] = &[
    ("generic_access", 0x1800),
    ("generic_attribute", 0x1801),
    ("immediate_alert", 0x1802),
    ("link_loss", 0x1803),
    ("tx_power", 0x1804),
    ("current_time", 0x1805),
    ("glucose", 0x1808),
    ("health_thermometer", 0x1809),
    ("device_information", 0x180a),
    ("heart_rate", 0x180d),
    ("battery_service", 0x180f),
    ("blood_pressure", 0x1810),
    ("human_interface_device", 0x1812),
    ("cycling_speed_and_cadence", 0x1816),
    ("environmental_sensing", 0x181a),
];

const CHARACTERISTICS: &[(&str, u16)] = &[
    ("gap.device_name", 0x2a00),
    ("gap.appearance", 0x2a01),
    ("gap.peripheral_privacy_flag", 0x2a02),
    ("gap.reconnection_address", 0x2a03),
    ("gap.peripheral_preferred_connection_parameters", 0x2a04),
    ("gatt.service_changed", 0x2a05),
    ("alert_level", 0x2a06),
    ("tx_power_level", 0x2a07),
    ("battery_level", 0x2a19),
    ("temperature_measurement", 0x2a1c),
    ("temperature_type", 0x2a1d),
    ("intermediate_temperature", 0x2a1e),
    ("measurement_interval", 0x2a21),
    ("serial_number_string", 0x2a25),
    ("heart_rate_measurement", 0x2a37),
    ("body_sensor_location", 0x2a38),
    ("heart_rate_control_point", 0x2a39),
];

const DESCRIPTORS: &[(&str, u16)] = &[
    ("gatt.characteristic_extended_properties", 0x2900),
    ("gatt.characteristic_user_description", 0x2901),
    ("gatt.client_characteristic_configuration", 0x2902),
    ("gatt.server_characteristic_configuration", 0x2903),
    ("gatt.characteristic_presentation_format", 0x2904),
    ("gatt.characteristic_aggregate_format", 0x2905),
    ("valid_range", 0x2906),
    ("number_of_digitals", 0x2909),
];

/// Resolve a name, alias or UUID string to a full UUID.
///
/// Accepts assigned names (`"health_thermometer"`), hexadecimal aliases
/// (`"0x1809"`) and lowercase UUID strings. Anything else is a `TypeError`.
pub fn resolve(kind: AttributeKind, name: &str) -> Result<Uuid, BluetoothError> {
    if let Some(hex) = name.strip_prefix("0x") {
        return u32::from_str_radix(hex, 16)
            .map(canonical_uuid)
            .map_err(|_| BluetoothError::Type(format!("Invalid {} alias '{}'", kind.label(), name)));
    }

    if name.len() == 36 && name.bytes().all(|b| !b.is_ascii_uppercase()) {
        if let Ok(uuid) = Uuid::parse_str(name) {
            return Ok(uuid);
        }
    }

    kind.table()
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, alias)| canonical_uuid(*alias as u32))
        .ok_or_else(|| {
            BluetoothError::Type(format!(
                "Invalid {} name: '{}'. It must be a valid UUID alias, a lowercase UUID string, \
                 or a recognized standard name.",
                kind.label(),
                name
            ))
        })
}

pub fn service(name: &str) -> Result<Uuid, BluetoothError> {
    resolve(AttributeKind::Service, name)
}

pub fn characteristic(name: &str) -> Result<Uuid, BluetoothError> {
    resolve(AttributeKind::Characteristic, name)
}

pub fn descriptor(name: &str) -> Result<Uuid, BluetoothError> {
    resolve(AttributeKind::Descriptor, name)
}

/// Reverse lookup of the assigned name of `uuid`
pub fn name_of(kind: AttributeKind, uuid: &Uuid) -> Option<&'static str> {
    let alias = short_alias(uuid)?;
    kind.table()
        .iter()
        .find(|(_, known)| *known == alias)
        .map(|(name, _)| *name)
}

/// The assigned name of `uuid` when it has one, the UUID itself otherwise
pub fn describe(kind: AttributeKind, uuid: &Uuid) -> String {
    name_of(kind, uuid).map_or_else(|| uuid.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_uuid() {
        assert_eq!(
            canonical_uuid(0x1809).to_string(),
            "00001809-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_short_alias() {
        assert_eq!(short_alias(&canonical_uuid(0x2a1c)), Some(0x2a1c));
        assert_eq!(short_alias(&canonical_uuid(0x0102_0304)), None);
        assert_eq!(short_alias(&Uuid::nil()), None);
    }

    #[test]
    fn test_resolve_names_and_aliases() {
        assert_eq!(service("health_thermometer").unwrap(), canonical_uuid(0x1809));
        assert_eq!(characteristic("0x2a21").unwrap(), canonical_uuid(0x2a21));
        assert_eq!(
            characteristic("00002a1c-0000-1000-8000-00805f9b34fb").unwrap(),
            canonical_uuid(0x2a1c)
        );
        assert_eq!(descriptor("gatt.client_characteristic_configuration").unwrap(), canonical_uuid(0x2902));
    }

    #[test]
    fn test_resolve_rejects_unknown_and_uppercase() {
        assert!(matches!(service("not_a_service"), Err(BluetoothError::Type(_))));
        assert!(matches!(
            service("00001809-0000-1000-8000-00805F9B34FB"),
            Err(BluetoothError::Type(_))
        ));
        // Names are per table
        assert!(service("temperature_measurement").is_err());
    }

    #[test]
    fn test_name_of() {
        assert_eq!(
            name_of(AttributeKind::Characteristic, &canonical_uuid(0x2a1c)),
            Some("temperature_measurement")
        );
        assert_eq!(name_of(AttributeKind::Service, &canonical_uuid(0x2a1c)), None);
    }

    #[test]
    fn test_describe_falls_back_to_uuid() {
        assert_eq!(
            describe(AttributeKind::Service, &canonical_uuid(0x1809)),
            "health_thermometer"
        );
        assert_eq!(
            describe(AttributeKind::Service, &canonical_uuid(0xfff0)),
            "0000fff0-0000-1000-8000-00805f9b34fb"
        );
    }
}
