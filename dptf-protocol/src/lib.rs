//! Requests and responses exchanged with the platform action layer
//!
//! Every hardware read or write issued by the arbitration core is expressed as
//! an [`ActionRequest`] addressed to one (participant, domain) pair. The action
//! layer answers with the matching [`ActionResponse`] variant.

use serde::{Deserialize, Serialize};

pub mod caps;
pub mod units;

pub use caps::*;
pub use units::{Percentage, Power, Temperature};

/// Opaque participant identifier
pub type ParticipantIndex = u32;

/// Domain identifier, unique within one participant
pub type DomainIndex = u32;

/// Opaque identifier of a requesting policy rule
pub type TargetIndex = u32;

/// Longest accepted PL time window (one hour)
const MAX_TIME_WINDOW_MS: u64 = 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "data")]
pub enum ActionRequest {
    // Power control
    GetPowerControlCapabilities,
    SetPowerControlCapabilities { capabilities: PowerControlDynamicCapsSet },
    SetPowerCapsLock { locked: bool },
    GetPowerLimit { control_type: PowerControlType },
    SetPowerLimit { control_type: PowerControlType, limit: Power },
    GetPowerLimitTimeWindow { control_type: PowerControlType },
    SetPowerLimitTimeWindow { control_type: PowerControlType, time_window_ms: u64 },
    GetAveragePower,
    GetCurrentPower,

    // Performance control
    GetPerformanceControlSet,
    GetPerformanceDynamicCaps,
    GetPerformanceStatus,
    SetPerformanceControl { index: u32 },

    // Core control
    GetCoreStaticCaps,
    GetCoreDynamicCaps,
    GetCoreLpoPreference,
    GetCoreStatus,
    SetActiveCores { count: u32 },

    // Display control
    GetDisplayCapabilities,
    GetDisplayStatus,
    SetDisplayControl { index: u32 },

    // Temperature
    GetTemperature,
    GetTemperatureThresholds,
    SetTemperatureThresholds { thresholds: TemperatureThresholds },

    GetUtilization,
}

impl ActionRequest {
    /// Validate request parameters before submitting them to the action layer
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ActionRequest::SetPowerControlCapabilities { capabilities } => {
                for (control_type, caps) in capabilities.iter() {
                    if caps.min_power_limit > caps.max_power_limit {
                        return Err(format!(
                            "{} minimum {} exceeds maximum {}",
                            control_type, caps.min_power_limit, caps.max_power_limit
                        ));
                    }
                    if caps.min_time_window_ms > caps.max_time_window_ms {
                        return Err(format!("{} time window range is inverted", control_type));
                    }
                }
                Ok(())
            }

            ActionRequest::GetPowerLimitTimeWindow { control_type } => {
                validate_time_window_slot(*control_type)
            }

            ActionRequest::SetPowerLimitTimeWindow { control_type, time_window_ms } => {
                validate_time_window_slot(*control_type)?;
                if *time_window_ms > MAX_TIME_WINDOW_MS {
                    return Err(format!(
                        "Time window {}ms exceeds maximum {}ms",
                        time_window_ms, MAX_TIME_WINDOW_MS
                    ));
                }
                Ok(())
            }

            ActionRequest::SetTemperatureThresholds { thresholds } => {
                if let (Some(aux0), Some(aux1)) = (thresholds.aux0, thresholds.aux1) {
                    if aux0 > aux1 {
                        return Err(format!("Lower threshold {} is above upper threshold {}", aux0, aux1));
                    }
                }
                if thresholds.hysteresis.millicelsius() < 0 {
                    return Err("Hysteresis must not be negative".into());
                }
                Ok(())
            }

            _ => Ok(()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ActionRequest::GetPowerControlCapabilities => "GetPowerControlCapabilities",
            ActionRequest::SetPowerControlCapabilities { .. } => "SetPowerControlCapabilities",
            ActionRequest::SetPowerCapsLock { .. } => "SetPowerCapsLock",
            ActionRequest::GetPowerLimit { .. } => "GetPowerLimit",
            ActionRequest::SetPowerLimit { .. } => "SetPowerLimit",
            ActionRequest::GetPowerLimitTimeWindow { .. } => "GetPowerLimitTimeWindow",
            ActionRequest::SetPowerLimitTimeWindow { .. } => "SetPowerLimitTimeWindow",
            ActionRequest::GetAveragePower => "GetAveragePower",
            ActionRequest::GetCurrentPower => "GetCurrentPower",
            ActionRequest::GetPerformanceControlSet => "GetPerformanceControlSet",
            ActionRequest::GetPerformanceDynamicCaps => "GetPerformanceDynamicCaps",
            ActionRequest::GetPerformanceStatus => "GetPerformanceStatus",
            ActionRequest::SetPerformanceControl { .. } => "SetPerformanceControl",
            ActionRequest::GetCoreStaticCaps => "GetCoreStaticCaps",
            ActionRequest::GetCoreDynamicCaps => "GetCoreDynamicCaps",
            ActionRequest::GetCoreLpoPreference => "GetCoreLpoPreference",
            ActionRequest::GetCoreStatus => "GetCoreStatus",
            ActionRequest::SetActiveCores { .. } => "SetActiveCores",
            ActionRequest::GetDisplayCapabilities => "GetDisplayCapabilities",
            ActionRequest::GetDisplayStatus => "GetDisplayStatus",
            ActionRequest::SetDisplayControl { .. } => "SetDisplayControl",
            ActionRequest::GetTemperature => "GetTemperature",
            ActionRequest::GetTemperatureThresholds => "GetTemperatureThresholds",
            ActionRequest::SetTemperatureThresholds { .. } => "SetTemperatureThresholds",
            ActionRequest::GetUtilization => "GetUtilization",
        }
    }

    /// True for requests that change hardware state
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            ActionRequest::SetPowerControlCapabilities { .. }
                | ActionRequest::SetPowerCapsLock { .. }
                | ActionRequest::SetPowerLimit { .. }
                | ActionRequest::SetPowerLimitTimeWindow { .. }
                | ActionRequest::SetPerformanceControl { .. }
                | ActionRequest::SetActiveCores { .. }
                | ActionRequest::SetDisplayControl { .. }
                | ActionRequest::SetTemperatureThresholds { .. }
        )
    }
}

fn validate_time_window_slot(control_type: PowerControlType) -> Result<(), String> {
    match control_type {
        PowerControlType::Pl1 | PowerControlType::Pl3 => Ok(()),
        other => Err(format!("{} has no time window", other)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ActionResponse {
    /// Write acknowledged
    Done,
    Power(Power),
    TimeWindow(u64),
    PowerCapabilities(PowerControlDynamicCapsSet),
    PerformanceControls(PerformanceControlSet),
    PerformanceCapabilities(PerformanceControlDynamicCaps),
    PerformanceStatus(PerformanceControlStatus),
    CoreStaticCaps(CoreControlStaticCaps),
    CoreDynamicCaps(CoreControlDynamicCaps),
    CoreLpoPreference(CoreControlLpoPreference),
    CoreStatus(CoreControlStatus),
    DisplayCapabilities(DisplayControlDynamicCaps),
    DisplayStatus(DisplayControlStatus),
    Temperature(Temperature),
    TemperatureThresholds(TemperatureThresholds),
    Utilization(Percentage),
}

impl ActionResponse {
    pub fn type_name(&self) -> &'static str {
        match self {
            ActionResponse::Done => "Done",
            ActionResponse::Power(_) => "Power",
            ActionResponse::TimeWindow(_) => "TimeWindow",
            ActionResponse::PowerCapabilities(_) => "PowerCapabilities",
            ActionResponse::PerformanceControls(_) => "PerformanceControls",
            ActionResponse::PerformanceCapabilities(_) => "PerformanceCapabilities",
            ActionResponse::PerformanceStatus(_) => "PerformanceStatus",
            ActionResponse::CoreStaticCaps(_) => "CoreStaticCaps",
            ActionResponse::CoreDynamicCaps(_) => "CoreDynamicCaps",
            ActionResponse::CoreLpoPreference(_) => "CoreLpoPreference",
            ActionResponse::CoreStatus(_) => "CoreStatus",
            ActionResponse::DisplayCapabilities(_) => "DisplayCapabilities",
            ActionResponse::DisplayStatus(_) => "DisplayStatus",
            ActionResponse::Temperature(_) => "Temperature",
            ActionResponse::TemperatureThresholds(_) => "TemperatureThresholds",
            ActionResponse::Utilization(_) => "Utilization",
        }
    }
}
