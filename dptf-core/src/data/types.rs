//! Domain properties and advertised control interfaces

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Control and status interfaces a domain implements
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DomainInterfaces: u32 {
        const POWER_CONTROL         = 1 << 0;
        const POWER_STATUS          = 1 << 1;
        const PERFORMANCE_CONTROL   = 1 << 2;
        const CORE_CONTROL          = 1 << 3;
        const DISPLAY_CONTROL       = 1 << 4;
        const TEMPERATURE           = 1 << 5;
        const TEMPERATURE_THRESHOLD = 1 << 6;
        const UTILIZATION           = 1 << 7;
    }
}

impl Default for DomainInterfaces {
    fn default() -> Self {
        Self::empty()
    }
}

/// Broad hardware category of a domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainType {
    Processor,
    Graphics,
    Memory,
    Display,
    Battery,
    WirelessRadio,
    #[default]
    Other,
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DomainType::Processor => "Processor",
            DomainType::Graphics => "Graphics",
            DomainType::Memory => "Memory",
            DomainType::Display => "Display",
            DomainType::Battery => "Battery",
            DomainType::WirelessRadio => "Wireless Radio",
            DomainType::Other => "Other",
        };
        write!(f, "{}", name)
    }
}

/// Immutable description of a domain, captured when it is bound
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainProperties {
    pub name: String,
    #[serde(default)]
    pub domain_type: DomainType,
    #[serde(default)]
    pub interfaces: DomainInterfaces,
}

impl DomainProperties {
    pub fn new(name: impl Into<String>, domain_type: DomainType, interfaces: DomainInterfaces) -> Self {
        Self {
            name: name.into(),
            domain_type,
            interfaces,
        }
    }

    pub fn implements_power_control(&self) -> bool {
        self.interfaces.contains(DomainInterfaces::POWER_CONTROL)
    }

    pub fn implements_power_status(&self) -> bool {
        self.interfaces.contains(DomainInterfaces::POWER_STATUS)
    }

    pub fn implements_performance_control(&self) -> bool {
        self.interfaces.contains(DomainInterfaces::PERFORMANCE_CONTROL)
    }

    pub fn implements_core_control(&self) -> bool {
        self.interfaces.contains(DomainInterfaces::CORE_CONTROL)
    }

    pub fn implements_display_control(&self) -> bool {
        self.interfaces.contains(DomainInterfaces::DISPLAY_CONTROL)
    }

    pub fn implements_temperature(&self) -> bool {
        self.interfaces.contains(DomainInterfaces::TEMPERATURE)
    }

    pub fn implements_temperature_threshold(&self) -> bool {
        self.interfaces.contains(DomainInterfaces::TEMPERATURE_THRESHOLD)
    }

    pub fn implements_utilization(&self) -> bool {
        self.interfaces.contains(DomainInterfaces::UTILIZATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interfaces_round_trip_as_names() {
        let props = DomainProperties::new(
            "CPU",
            DomainType::Processor,
            DomainInterfaces::POWER_CONTROL | DomainInterfaces::CORE_CONTROL,
        );
        let json = serde_json::to_string(&props).unwrap();
        assert!(json.contains("POWER_CONTROL | CORE_CONTROL"));

        let back: DomainProperties = serde_json::from_str(&json).unwrap();
        assert!(back.implements_power_control());
        assert!(back.implements_core_control());
        assert!(!back.implements_display_control());
    }

    #[test]
    fn test_missing_fields_default() {
        let props: DomainProperties = serde_json::from_str(r#"{"name":"Panel"}"#).unwrap();
        assert_eq!(props.domain_type, DomainType::Other);
        assert!(props.interfaces.is_empty());
    }
}
