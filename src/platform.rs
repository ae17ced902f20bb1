/*
 * This file is part of dptf.
 *
 * Copyright (C) 2025 dptf contributors
 *
 * dptf is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * dptf is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with dptf. If not, see <https://www.gnu.org/licenses/>.
 */

//! JSON description of a simulated platform
//!
//! A description lists participants and their domains. Each domain names the
//! interfaces it advertises and a compact hardware spec that seeds the
//! simulator, e.g.
//!
//! ```json
//! {
//!   "participants": [{
//!     "index": 0, "name": "SoC",
//!     "domains": [{
//!       "index": 0, "name": "CPU", "domain_type": "processor",
//!       "interfaces": "POWER_CONTROL | POWER_STATUS",
//!       "hardware": { "power": { "min_watts": 5, "max_watts": 25, "step_watts": 1, "average_watts": 12 } }
//!     }]
//!   }]
//! }
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use dptf_core::simulator::{
    SimulatedCore, SimulatedDisplay, SimulatedDomain, SimulatedPerformance, SimulatedPlatform,
    SimulatedPower, SimulatedTemperature,
};
use dptf_core::{DomainInterfaces, DomainProperties, DomainType, ParticipantProxy};
use dptf_error::{DptfError, Result};
use dptf_protocol::{DomainIndex, ParticipantIndex, Percentage, Power, Temperature};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSpec {
    pub min_watts: f64,
    pub max_watts: f64,
    pub step_watts: f64,
    pub average_watts: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSpec {
    pub pstates: u32,
    #[serde(default)]
    pub tstates: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreSpec {
    pub total: u32,
    pub min_active: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySpec {
    pub levels: u32,
    /// Brightness index the user left the panel at
    #[serde(default)]
    pub user_index: u32,
}

/// Simulated hardware behind one domain. Absent sections mean the control
/// does not exist on the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainHardware {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores: Option<CoreSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplaySpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_celsius: Option<f64>,
    /// Fraction in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization: Option<f64>,
}

impl DomainHardware {
    pub fn to_simulated(&self) -> SimulatedDomain {
        let mut domain = SimulatedDomain::new();
        if let Some(power) = &self.power {
            domain = domain.with_power(SimulatedPower::pl1(
                Power::from_watts(power.min_watts),
                Power::from_watts(power.max_watts),
                Power::from_watts(power.step_watts),
                Power::from_watts(power.average_watts),
            ));
        }
        if let Some(performance) = &self.performance {
            domain = domain.with_performance(SimulatedPerformance::new(performance.pstates, performance.tstates));
        }
        if let Some(cores) = &self.cores {
            domain = domain.with_core(SimulatedCore::new(cores.total, cores.min_active));
        }
        if let Some(display) = &self.display {
            let mut simulated = SimulatedDisplay::new(display.levels);
            simulated.current_index = display.user_index;
            domain = domain.with_display(simulated);
        }
        if let Some(celsius) = self.temperature_celsius {
            domain = domain.with_temperature(SimulatedTemperature::new(Temperature::from_celsius(celsius)));
        }
        if let Some(utilization) = self.utilization {
            domain = domain.with_utilization(Percentage::from_fraction(utilization));
        }
        domain
    }

    fn validate(&self, location: &str) -> Result<()> {
        if let Some(power) = &self.power {
            if power.min_watts > power.max_watts || power.step_watts <= 0.0 {
                return Err(invalid(location, "power", "needs min <= max and a positive step"));
            }
        }
        if let Some(cores) = &self.cores {
            if cores.min_active == 0 || cores.min_active > cores.total {
                return Err(invalid(location, "cores", "needs 1 <= min_active <= total"));
            }
        }
        if let Some(display) = &self.display {
            if display.levels == 0 || display.user_index >= display.levels {
                return Err(invalid(location, "display", "user_index must be below levels"));
            }
        }
        if let Some(utilization) = self.utilization {
            if !(0.0..=1.0).contains(&utilization) {
                return Err(invalid(location, "utilization", "must be within [0, 1]"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDescription {
    pub index: DomainIndex,
    pub name: String,
    #[serde(default)]
    pub domain_type: DomainType,
    #[serde(default)]
    pub interfaces: DomainInterfaces,
    #[serde(default)]
    pub hardware: DomainHardware,
}

impl DomainDescription {
    pub fn properties(&self) -> DomainProperties {
        DomainProperties::new(self.name.clone(), self.domain_type, self.interfaces)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantDescription {
    pub index: ParticipantIndex,
    pub name: String,
    #[serde(default)]
    pub domains: Vec<DomainDescription>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformDescription {
    pub participants: Vec<ParticipantDescription>,
}

fn invalid(location: &str, field: &str, reason: &str) -> DptfError {
    DptfError::InvalidConfig {
        field: format!("{}.{}", location, field),
        reason: reason.to_string(),
    }
}

impl PlatformDescription {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| DptfError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let description: PlatformDescription = serde_json::from_str(&content)?;
        description.validate()?;
        Ok(description)
    }

    /// Reject duplicate indexes and hardware specs the simulator cannot model
    pub fn validate(&self) -> Result<()> {
        let mut participants = BTreeSet::new();
        for participant in &self.participants {
            if !participants.insert(participant.index) {
                return Err(DptfError::InvalidConfig {
                    field: "participants".into(),
                    reason: format!("duplicate participant index {}", participant.index),
                });
            }

            let mut domains = BTreeSet::new();
            for domain in &participant.domains {
                let location = format!("participant {} domain {}", participant.index, domain.index);
                if !domains.insert(domain.index) {
                    return Err(invalid(&location, "index", "duplicate domain index"));
                }
                domain.hardware.validate(&location)?;
            }
        }
        Ok(())
    }

    /// Seed a simulator with every domain and bind proxies onto it.
    /// Participants come back in description order.
    pub fn build(&self) -> (Arc<SimulatedPlatform>, Vec<ParticipantProxy>) {
        let platform = Arc::new(SimulatedPlatform::new());
        let participants = self
            .participants
            .iter()
            .map(|description| {
                let mut participant = ParticipantProxy::new(description.index, description.name.clone());
                for domain in &description.domains {
                    platform.insert_domain(description.index, domain.index, domain.hardware.to_simulated());
                    participant.bind_domain(platform.clone(), domain.index, domain.properties());
                }
                participant
            })
            .collect::<Vec<_>>();

        info!(
            "Built simulated platform with {} participant(s), {} domain(s)",
            participants.len(),
            self.participants.iter().map(|p| p.domains.len()).sum::<usize>()
        );
        (platform, participants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "participants": [{
            "index": 0,
            "name": "SoC",
            "domains": [
                {
                    "index": 0, "name": "CPU", "domain_type": "processor",
                    "interfaces": "POWER_CONTROL | POWER_STATUS | PERFORMANCE_CONTROL",
                    "hardware": {
                        "power": { "min_watts": 5, "max_watts": 25, "step_watts": 1, "average_watts": 12 },
                        "performance": { "pstates": 4, "tstates": 2 }
                    }
                },
                {
                    "index": 1, "name": "Panel", "domain_type": "display",
                    "interfaces": "DISPLAY_CONTROL",
                    "hardware": { "display": { "levels": 10, "user_index": 3 } }
                }
            ]
        }]
    }"#;

    #[test]
    fn test_parse_interfaces_and_hardware() {
        let description: PlatformDescription = serde_json::from_str(SAMPLE).unwrap();
        description.validate().unwrap();

        let cpu = &description.participants[0].domains[0];
        assert_eq!(cpu.domain_type, DomainType::Processor);
        assert!(cpu.interfaces.contains(DomainInterfaces::PERFORMANCE_CONTROL));
        assert!(!cpu.interfaces.contains(DomainInterfaces::DISPLAY_CONTROL));

        let simulated = cpu.hardware.to_simulated();
        assert!(simulated.power.is_some());
        assert_eq!(simulated.performance.unwrap().controls.len(), 6);
        assert!(simulated.display.is_none());
    }

    #[test]
    fn test_build_binds_every_domain() {
        let description: PlatformDescription = serde_json::from_str(SAMPLE).unwrap();
        let (platform, participants) = description.build();

        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].domain_indexes(), vec![0, 1]);
        assert_eq!(platform.domain(0, 1).unwrap().display.unwrap().current_index, 3);
        assert_eq!(participants[0].domain(1).unwrap().properties().name, "Panel");
    }

    #[test]
    fn test_duplicate_domain_rejected() {
        let mut description: PlatformDescription = serde_json::from_str(SAMPLE).unwrap();
        description.participants[0].domains[1].index = 0;
        assert!(matches!(
            description.validate().unwrap_err(),
            DptfError::InvalidConfig { .. }
        ));
    }

    #[test]
    fn test_display_user_index_must_fit() {
        let mut description: PlatformDescription = serde_json::from_str(SAMPLE).unwrap();
        description.participants[0].domains[1].hardware.display = Some(DisplaySpec {
            levels: 4,
            user_index: 4,
        });
        assert!(description.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("platform.json");
        fs::write(&path, SAMPLE).unwrap();
        let description = PlatformDescription::load(&path).unwrap();
        assert_eq!(description.participants[0].name, "SoC");

        assert!(matches!(
            PlatformDescription::load(&dir.path().join("missing.json")).unwrap_err(),
            DptfError::FileRead { .. }
        ));
    }
}
