//! GATT characteristic property flags

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::BridgeError;

bitflags! {
    /// The characteristic properties byte (Core Spec Vol 3 Part G 3.3.1.1)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CharacteristicProperties: u8 {
        const BROADCAST                   = 0x01;
        const READ                        = 0x02;
        const WRITE_WITHOUT_RESPONSE      = 0x04;
        const WRITE                       = 0x08;
        const NOTIFY                      = 0x10;
        const INDICATE                    = 0x20;
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        const EXTENDED_PROPERTIES         = 0x80;
    }
}

/// One named property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Broadcast,
    Read,
    WriteWithoutResponse,
    Write,
    Notify,
    Indicate,
    AuthenticatedSignedWrites,
    ExtendedProperties,
}

impl Property {
    /// Every property, in bit order
    pub const ALL: [Property; 8] = [
        Property::Broadcast,
        Property::Read,
        Property::WriteWithoutResponse,
        Property::Write,
        Property::Notify,
        Property::Indicate,
        Property::AuthenticatedSignedWrites,
        Property::ExtendedProperties,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Broadcast => "broadcast",
            Self::Read => "read",
            Self::WriteWithoutResponse => "write-without-response",
            Self::Write => "write",
            Self::Notify => "notify",
            Self::Indicate => "indicate",
            Self::AuthenticatedSignedWrites => "authenticated-signed-writes",
            Self::ExtendedProperties => "extended-properties",
        }
    }

    pub fn flag(&self) -> CharacteristicProperties {
        match self {
            Self::Broadcast => CharacteristicProperties::BROADCAST,
            Self::Read => CharacteristicProperties::READ,
            Self::WriteWithoutResponse => CharacteristicProperties::WRITE_WITHOUT_RESPONSE,
            Self::Write => CharacteristicProperties::WRITE,
            Self::Notify => CharacteristicProperties::NOTIFY,
            Self::Indicate => CharacteristicProperties::INDICATE,
            Self::AuthenticatedSignedWrites => CharacteristicProperties::AUTHENTICATED_SIGNED_WRITES,
            Self::ExtendedProperties => CharacteristicProperties::EXTENDED_PROPERTIES,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Property {
    type Err = BridgeError;

    /// Accepts both the kebab-case names and the camelCase attribute names
    /// (`writeWithoutResponse`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "broadcast" => Ok(Self::Broadcast),
            "read" => Ok(Self::Read),
            "write-without-response" | "writeWithoutResponse" => Ok(Self::WriteWithoutResponse),
            "write" => Ok(Self::Write),
            "notify" => Ok(Self::Notify),
            "indicate" => Ok(Self::Indicate),
            "authenticated-signed-writes" | "authenticatedSignedWrites" => {
                Ok(Self::AuthenticatedSignedWrites)
            }
            "extended-properties" | "extendedProperties" => Ok(Self::ExtendedProperties),
            other => Err(BridgeError::Configuration(format!(
                "unknown characteristic property '{}'",
                other
            ))),
        }
    }
}

impl CharacteristicProperties {
    /// Build from property names; unnamed properties stay false
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, BridgeError> {
        names.iter().try_fold(Self::empty(), |props, name| {
            Ok(props | name.as_ref().parse::<Property>()?.flag())
        })
    }

    pub fn has(&self, property: Property) -> bool {
        self.contains(property.flag())
    }

    /// Names of the set properties, in bit order
    pub fn names(&self) -> Vec<&'static str> {
        Property::ALL
            .iter()
            .filter(|p| self.has(**p))
            .map(|p| p.name())
            .collect()
    }

    pub fn broadcast(&self) -> bool {
        self.has(Property::Broadcast)
    }

    pub fn read(&self) -> bool {
        self.has(Property::Read)
    }

    pub fn write_without_response(&self) -> bool {
        self.has(Property::WriteWithoutResponse)
    }

    pub fn write(&self) -> bool {
        self.has(Property::Write)
    }

    pub fn notify(&self) -> bool {
        self.has(Property::Notify)
    }

    pub fn indicate(&self) -> bool {
        self.has(Property::Indicate)
    }

    pub fn authenticated_signed_writes(&self) -> bool {
        self.has(Property::AuthenticatedSignedWrites)
    }

    pub fn extended_properties(&self) -> bool {
        self.has(Property::ExtendedProperties)
    }

    /// Properties whose value differs between `self` and `other`
    pub fn mismatches(&self, other: &CharacteristicProperties) -> Vec<Property> {
        Property::ALL
            .iter()
            .copied()
            .filter(|p| self.has(*p) != other.has(*p))
            .collect()
    }
}

/// Expected property set phrased as a list of names, as a test writes it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestCharacteristicProperties {
    properties: CharacteristicProperties,
}

impl TestCharacteristicProperties {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self, BridgeError> {
        Ok(Self {
            properties: CharacteristicProperties::from_names(names)?,
        })
    }

    pub fn properties(&self) -> CharacteristicProperties {
        self.properties
    }
}

impl From<CharacteristicProperties> for TestCharacteristicProperties {
    fn from(properties: CharacteristicProperties) -> Self {
        Self { properties }
    }
}

/// How a characteristic write is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteType {
    /// `writeValue()`: either write flag is enough
    Any,
    WithResponse,
    WithoutResponse,
}

impl WriteType {
    pub fn permitted_by(self, properties: &CharacteristicProperties) -> bool {
        match self {
            Self::Any => properties.write() || properties.write_without_response(),
            Self::WithResponse => properties.write(),
            Self::WithoutResponse => properties.write_without_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_names_sets_only_named_flags() {
        let props = CharacteristicProperties::from_names(&["indicate"]).unwrap();
        assert!(props.indicate());
        assert!(!props.read());
        assert!(!props.write());
        assert!(!props.notify());
        assert!(!props.broadcast());
        assert!(!props.write_without_response());
        assert!(!props.authenticated_signed_writes());
        assert!(!props.extended_properties());
    }

    #[test]
    fn test_unknown_name_rejected() {
        assert!(CharacteristicProperties::from_names(&["read", "telepathy"]).is_err());
    }

    #[test]
    fn test_camel_case_aliases() {
        let props =
            CharacteristicProperties::from_names(&["writeWithoutResponse", "authenticatedSignedWrites"])
                .unwrap();
        assert_eq!(
            props,
            CharacteristicProperties::WRITE_WITHOUT_RESPONSE
                | CharacteristicProperties::AUTHENTICATED_SIGNED_WRITES
        );
    }

    #[test]
    fn test_names_in_bit_order() {
        let props = CharacteristicProperties::from_names(&["indicate", "write", "read"]).unwrap();
        assert_eq!(props.names(), vec!["read", "write", "indicate"]);
    }

    #[test]
    fn test_mismatches_lists_every_differing_flag() {
        let actual = CharacteristicProperties::READ | CharacteristicProperties::NOTIFY;
        let expected = CharacteristicProperties::READ | CharacteristicProperties::INDICATE;
        assert_eq!(actual.mismatches(&expected), vec![Property::Notify, Property::Indicate]);
        assert!(actual.mismatches(&actual).is_empty());
    }

    #[test]
    fn test_partial_match_is_a_mismatch() {
        let actual = CharacteristicProperties::from_names(&["read", "write", "indicate"]).unwrap();
        let expected = TestCharacteristicProperties::new(&["read", "write"]).unwrap();
        assert_eq!(actual.mismatches(&expected.properties()), vec![Property::Indicate]);
    }

    #[test]
    fn test_write_type_permissions() {
        let without = CharacteristicProperties::WRITE_WITHOUT_RESPONSE;
        assert!(WriteType::Any.permitted_by(&without));
        assert!(WriteType::WithoutResponse.permitted_by(&without));
        assert!(!WriteType::WithResponse.permitted_by(&without));

        let with = CharacteristicProperties::WRITE;
        assert!(WriteType::Any.permitted_by(&with));
        assert!(!WriteType::WithoutResponse.permitted_by(&with));

        assert!(!WriteType::Any.permitted_by(&CharacteristicProperties::READ));
    }
}
