//! Capability, preference and status value objects reported by the action layer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::units::{Percentage, Power, Temperature};

// ============================================================================
// Power Control
// ============================================================================

/// Package power limit slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerControlType {
    Pl1,
    Pl2,
    Pl3,
    Pl4,
}

impl fmt::Display for PowerControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerControlType::Pl1 => write!(f, "PL1"),
            PowerControlType::Pl2 => write!(f, "PL2"),
            PowerControlType::Pl3 => write!(f, "PL3"),
            PowerControlType::Pl4 => write!(f, "PL4"),
        }
    }
}

/// Currently legal range for one power limit slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerControlDynamicCaps {
    pub min_power_limit: Power,
    pub max_power_limit: Power,
    pub power_step_size: Power,
    #[serde(default)]
    pub min_time_window_ms: u64,
    #[serde(default)]
    pub max_time_window_ms: u64,
}

impl PowerControlDynamicCaps {
    pub fn new(min_power_limit: Power, max_power_limit: Power, power_step_size: Power) -> Self {
        Self {
            min_power_limit,
            max_power_limit,
            power_step_size,
            min_time_window_ms: 0,
            max_time_window_ms: 0,
        }
    }

    pub fn with_time_window_ms(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.min_time_window_ms = min_ms;
        self.max_time_window_ms = max_ms;
        self
    }

    pub fn snap_power(&self, power: Power) -> Power {
        power.min(self.max_power_limit).max(self.min_power_limit)
    }

    pub fn snap_time_window_ms(&self, window_ms: u64) -> u64 {
        window_ms.min(self.max_time_window_ms).max(self.min_time_window_ms)
    }
}

/// Power capabilities keyed by limit slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PowerControlDynamicCapsSet {
    capabilities: BTreeMap<PowerControlType, PowerControlDynamicCaps>,
}

impl PowerControlDynamicCapsSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn has_capability(&self, control_type: PowerControlType) -> bool {
        self.capabilities.contains_key(&control_type)
    }

    pub fn capability(&self, control_type: PowerControlType) -> Option<&PowerControlDynamicCaps> {
        self.capabilities.get(&control_type)
    }

    pub fn set_capability(&mut self, control_type: PowerControlType, caps: PowerControlDynamicCaps) {
        self.capabilities.insert(control_type, caps);
    }

    pub fn control_types(&self) -> Vec<PowerControlType> {
        self.capabilities.keys().copied().collect()
    }

    /// Clamp a power value into the slot's range; unchanged when the slot is absent
    pub fn snap_to_capability(&self, control_type: PowerControlType, power: Power) -> Power {
        match self.capability(control_type) {
            Some(caps) => caps.snap_power(power),
            None => power,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PowerControlType, &PowerControlDynamicCaps)> {
        self.capabilities.iter()
    }
}

impl FromIterator<(PowerControlType, PowerControlDynamicCaps)> for PowerControlDynamicCapsSet {
    fn from_iter<I: IntoIterator<Item = (PowerControlType, PowerControlDynamicCaps)>>(iter: I) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Performance Control
// ============================================================================

/// Sub-range of the shared performance index space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceControlType {
    /// Frequency scaling (P-state)
    PerformanceState,
    /// Throttle / duty-cycle (T-state)
    ThrottleState,
}

impl fmt::Display for PerformanceControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceControlType::PerformanceState => write!(f, "P-State"),
            PerformanceControlType::ThrottleState => write!(f, "T-State"),
        }
    }
}

/// One entry of the performance control set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceControl {
    pub control_id: u32,
    pub control_type: PerformanceControlType,
    pub tdp_power: Power,
    pub performance_percentage: Percentage,
    #[serde(default)]
    pub latency_us: u32,
    pub control_absolute_value: u32,
    #[serde(default)]
    pub value_units: String,
}

/// Performance controls ordered from least to most restrictive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerformanceControlSet {
    controls: Vec<PerformanceControl>,
}

impl PerformanceControlSet {
    pub fn new(controls: Vec<PerformanceControl>) -> Self {
        Self { controls }
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&PerformanceControl> {
        self.controls.get(index as usize)
    }

    pub fn control_type(&self, index: u32) -> Option<PerformanceControlType> {
        self.get(index).map(|control| control.control_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PerformanceControl> {
        self.controls.iter()
    }
}

/// Index bounds; the upper limit index is the least restrictive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceControlDynamicCaps {
    pub current_upper_limit_index: u32,
    pub current_lower_limit_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceControlStatus {
    pub current_control_set_index: u32,
}

// ============================================================================
// Core Control
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreControlStaticCaps {
    pub total_logical_processors: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreControlDynamicCaps {
    pub min_active_cores: u32,
    pub max_active_cores: u32,
}

/// Logical processor offlining (LPO) preferences
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoreControlLpoPreference {
    pub lpo_enabled: bool,
    /// P-state index at which core offlining may begin
    pub start_pstate_index: u32,
    /// Fraction of total logical processors removed per step
    pub step_size: Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreControlStatus {
    pub active_logical_processors: u32,
}

// ============================================================================
// Display Control
// ============================================================================

/// Brightness index bounds; index 0 is the brightest level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayControlDynamicCaps {
    pub current_upper_limit: u32,
    pub current_lower_limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayControlStatus {
    pub brightness_limit_index: u32,
}

// ============================================================================
// Temperature
// ============================================================================

/// Notification thresholds; `None` means the bound is disabled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureThresholds {
    pub aux0: Option<Temperature>,
    pub aux1: Option<Temperature>,
    pub hysteresis: Temperature,
}
