//! In-memory action layer
//!
//! `SimulatedPlatform` answers action requests from per-domain simulated
//! hardware state. It records every successful write and can be told to fail
//! chosen request types, which is how capability changes and flaky firmware
//! are reproduced without a real platform.

use std::collections::{BTreeMap, BTreeSet};

use dptf_protocol::{
    ActionRequest, ActionResponse, CoreControlDynamicCaps, CoreControlLpoPreference,
    CoreControlStaticCaps, CoreControlStatus, DisplayControlDynamicCaps, DisplayControlStatus,
    DomainIndex, ParticipantIndex, Percentage, PerformanceControl, PerformanceControlDynamicCaps,
    PerformanceControlSet, PerformanceControlStatus, PerformanceControlType, Power,
    PowerControlDynamicCaps, PowerControlDynamicCapsSet, PowerControlType, Temperature,
    TemperatureThresholds,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DptfError, Result};
use crate::services::ActionLayer;

// ============================================================================
// Simulated Controls
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedPower {
    pub capabilities: PowerControlDynamicCapsSet,
    #[serde(default)]
    pub limits: BTreeMap<PowerControlType, Power>,
    #[serde(default)]
    pub time_windows_ms: BTreeMap<PowerControlType, u64>,
    pub average_power: Power,
    #[serde(default)]
    pub current_power: Power,
    #[serde(default)]
    pub capabilities_locked: bool,
}

impl SimulatedPower {
    /// PL1-only power control, programmed at its maximum
    pub fn pl1(min: Power, max: Power, step: Power, average_power: Power) -> Self {
        let capabilities: PowerControlDynamicCapsSet = [(
            PowerControlType::Pl1,
            PowerControlDynamicCaps::new(min, max, step).with_time_window_ms(1_000, 56_000),
        )]
        .into_iter()
        .collect();

        Self {
            capabilities,
            limits: [(PowerControlType::Pl1, max)].into_iter().collect(),
            time_windows_ms: BTreeMap::new(),
            average_power,
            current_power: average_power,
            capabilities_locked: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedPerformance {
    pub controls: PerformanceControlSet,
    pub capabilities: PerformanceControlDynamicCaps,
    #[serde(default)]
    pub current_index: u32,
}

impl SimulatedPerformance {
    /// Build a control set of `pstates` P-states followed by `tstates` T-states
    pub fn new(pstates: u32, tstates: u32) -> Self {
        let total = (pstates + tstates).max(1);
        let controls = (0..pstates + tstates)
            .map(|index| {
                let remaining = f64::from(total - index) / f64::from(total);
                let control_type = if index < pstates {
                    PerformanceControlType::PerformanceState
                } else {
                    PerformanceControlType::ThrottleState
                };
                PerformanceControl {
                    control_id: index,
                    control_type,
                    tdp_power: Power::from_watts(25.0 * remaining),
                    performance_percentage: Percentage::from_fraction(remaining),
                    latency_us: 10,
                    control_absolute_value: if index < pstates { 3_600u32.saturating_sub(index * 200) } else { index },
                    value_units: if index < pstates { "MHz".into() } else { "%".into() },
                }
            })
            .collect();

        Self {
            controls: PerformanceControlSet::new(controls),
            capabilities: PerformanceControlDynamicCaps {
                current_upper_limit_index: 0,
                current_lower_limit_index: (pstates + tstates).saturating_sub(1),
            },
            current_index: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedCore {
    pub static_caps: CoreControlStaticCaps,
    pub dynamic_caps: CoreControlDynamicCaps,
    pub lpo_preference: CoreControlLpoPreference,
    pub active_cores: u32,
}

impl SimulatedCore {
    /// All `total` logical processors online, offlining allowed down to `min_active`
    pub fn new(total: u32, min_active: u32) -> Self {
        Self {
            static_caps: CoreControlStaticCaps {
                total_logical_processors: total,
            },
            dynamic_caps: CoreControlDynamicCaps {
                min_active_cores: min_active,
                max_active_cores: total,
            },
            lpo_preference: CoreControlLpoPreference {
                lpo_enabled: true,
                start_pstate_index: 0,
                step_size: Percentage::from_fraction(0.25),
            },
            active_cores: total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedDisplay {
    pub capabilities: DisplayControlDynamicCaps,
    #[serde(default)]
    pub current_index: u32,
}

impl SimulatedDisplay {
    /// Brightness table with `levels` entries, currently at full brightness
    pub fn new(levels: u32) -> Self {
        Self {
            capabilities: DisplayControlDynamicCaps {
                current_upper_limit: 0,
                current_lower_limit: levels.saturating_sub(1),
            },
            current_index: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedTemperature {
    pub temperature: Temperature,
    #[serde(default)]
    pub thresholds: TemperatureThresholds,
}

impl SimulatedTemperature {
    pub fn new(temperature: Temperature) -> Self {
        Self {
            temperature,
            thresholds: TemperatureThresholds::default(),
        }
    }
}

/// Simulated hardware behind one domain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatedDomain {
    #[serde(default)]
    pub power: Option<SimulatedPower>,
    #[serde(default)]
    pub performance: Option<SimulatedPerformance>,
    #[serde(default)]
    pub core: Option<SimulatedCore>,
    #[serde(default)]
    pub display: Option<SimulatedDisplay>,
    #[serde(default)]
    pub temperature: Option<SimulatedTemperature>,
    #[serde(default)]
    pub utilization: Option<Percentage>,
    /// Request type names that fail until cleared
    #[serde(default)]
    pub failing_requests: BTreeSet<String>,
}

impl SimulatedDomain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_power(mut self, power: SimulatedPower) -> Self {
        self.power = Some(power);
        self
    }

    pub fn with_performance(mut self, performance: SimulatedPerformance) -> Self {
        self.performance = Some(performance);
        self
    }

    pub fn with_core(mut self, core: SimulatedCore) -> Self {
        self.core = Some(core);
        self
    }

    pub fn with_display(mut self, display: SimulatedDisplay) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_temperature(mut self, temperature: SimulatedTemperature) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_utilization(mut self, utilization: Percentage) -> Self {
        self.utilization = Some(utilization);
        self
    }
}

/// Successful write observed by the simulator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteRecord {
    pub participant: ParticipantIndex,
    pub domain: DomainIndex,
    pub request: ActionRequest,
}

// ============================================================================
// Platform
// ============================================================================

#[derive(Debug, Default)]
pub struct SimulatedPlatform {
    domains: Mutex<BTreeMap<(ParticipantIndex, DomainIndex), SimulatedDomain>>,
    writes: Mutex<Vec<WriteRecord>>,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_domain(&self, participant: ParticipantIndex, domain: DomainIndex, state: SimulatedDomain) {
        self.domains.lock().insert((participant, domain), state);
    }

    pub fn remove_domain(&self, participant: ParticipantIndex, domain: DomainIndex) -> Option<SimulatedDomain> {
        self.domains.lock().remove(&(participant, domain))
    }

    /// Snapshot of one domain's simulated state
    pub fn domain(&self, participant: ParticipantIndex, domain: DomainIndex) -> Option<SimulatedDomain> {
        self.domains.lock().get(&(participant, domain)).cloned()
    }

    /// Mutate simulated hardware, e.g. to emulate a capability-changed event
    pub fn update_domain<F>(&self, participant: ParticipantIndex, domain: DomainIndex, update: F) -> Result<()>
    where
        F: FnOnce(&mut SimulatedDomain),
    {
        let mut domains = self.domains.lock();
        let state = domains
            .get_mut(&(participant, domain))
            .ok_or(DptfError::UnknownDomain { participant, domain })?;
        update(state);
        Ok(())
    }

    /// Make every request of `request_type` fail on one domain
    pub fn fail_request(&self, participant: ParticipantIndex, domain: DomainIndex, request_type: &str) -> Result<()> {
        self.update_domain(participant, domain, |state| {
            state.failing_requests.insert(request_type.to_string());
        })
    }

    pub fn clear_failures(&self, participant: ParticipantIndex, domain: DomainIndex) -> Result<()> {
        self.update_domain(participant, domain, |state| state.failing_requests.clear())
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self, participant: ParticipantIndex, domain: DomainIndex) -> usize {
        self.writes
            .lock()
            .iter()
            .filter(|w| w.participant == participant && w.domain == domain)
            .count()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }
}

impl ActionLayer for SimulatedPlatform {
    fn submit_request(
        &self,
        participant: ParticipantIndex,
        domain: DomainIndex,
        request: ActionRequest,
    ) -> Result<ActionResponse> {
        let name = request.type_name();
        let response = {
            let mut domains = self.domains.lock();
            let state = domains
                .get_mut(&(participant, domain))
                .ok_or(DptfError::UnknownDomain { participant, domain })?;

            if state.failing_requests.contains(name) {
                warn!("Simulated failure of {} on participant {} domain {}", name, participant, domain);
                return Err(DptfError::action_failed(name, participant, domain, "injected failure"));
            }

            apply_request(state, &request)
                .map_err(|reason| DptfError::action_failed(name, participant, domain, reason))?
        };

        if request.is_write() {
            debug!("Simulator applied {} on participant {} domain {}", name, participant, domain);
            self.writes.lock().push(WriteRecord {
                participant,
                domain,
                request,
            });
        }
        Ok(response)
    }
}

fn missing(control: &str) -> String {
    format!("{} is not implemented by this domain", control)
}

fn apply_request(state: &mut SimulatedDomain, request: &ActionRequest) -> std::result::Result<ActionResponse, String> {
    use ActionRequest as R;

    match request {
        // Power
        R::GetPowerControlCapabilities => {
            let power = state.power.as_ref().ok_or_else(|| missing("power control"))?;
            Ok(ActionResponse::PowerCapabilities(power.capabilities.clone()))
        }
        R::SetPowerControlCapabilities { capabilities } => {
            let power = state.power.as_mut().ok_or_else(|| missing("power control"))?;
            if power.capabilities_locked {
                return Err("power capabilities are locked".into());
            }
            for (control_type, caps) in capabilities.iter() {
                power.capabilities.set_capability(*control_type, *caps);
            }
            Ok(ActionResponse::Done)
        }
        R::SetPowerCapsLock { locked } => {
            let power = state.power.as_mut().ok_or_else(|| missing("power control"))?;
            power.capabilities_locked = *locked;
            Ok(ActionResponse::Done)
        }
        R::GetPowerLimit { control_type } => {
            let power = state.power.as_ref().ok_or_else(|| missing("power control"))?;
            power
                .limits
                .get(control_type)
                .copied()
                .map(ActionResponse::Power)
                .ok_or_else(|| format!("{} has never been programmed", control_type))
        }
        R::SetPowerLimit { control_type, limit } => {
            let power = state.power.as_mut().ok_or_else(|| missing("power control"))?;
            if !power.capabilities.has_capability(*control_type) {
                return Err(format!("{} is not a supported power limit", control_type));
            }
            power.limits.insert(*control_type, *limit);
            Ok(ActionResponse::Done)
        }
        R::GetPowerLimitTimeWindow { control_type } => {
            let power = state.power.as_ref().ok_or_else(|| missing("power control"))?;
            let window = power.time_windows_ms.get(control_type).copied().unwrap_or(0);
            Ok(ActionResponse::TimeWindow(window))
        }
        R::SetPowerLimitTimeWindow {
            control_type,
            time_window_ms,
        } => {
            let power = state.power.as_mut().ok_or_else(|| missing("power control"))?;
            power.time_windows_ms.insert(*control_type, *time_window_ms);
            Ok(ActionResponse::Done)
        }
        R::GetAveragePower => {
            let power = state.power.as_ref().ok_or_else(|| missing("power status"))?;
            Ok(ActionResponse::Power(power.average_power))
        }
        R::GetCurrentPower => {
            let power = state.power.as_ref().ok_or_else(|| missing("power status"))?;
            Ok(ActionResponse::Power(power.current_power))
        }

        // Performance
        R::GetPerformanceControlSet => {
            let perf = state.performance.as_ref().ok_or_else(|| missing("performance control"))?;
            Ok(ActionResponse::PerformanceControls(perf.controls.clone()))
        }
        R::GetPerformanceDynamicCaps => {
            let perf = state.performance.as_ref().ok_or_else(|| missing("performance control"))?;
            Ok(ActionResponse::PerformanceCapabilities(perf.capabilities))
        }
        R::GetPerformanceStatus => {
            let perf = state.performance.as_ref().ok_or_else(|| missing("performance control"))?;
            Ok(ActionResponse::PerformanceStatus(PerformanceControlStatus {
                current_control_set_index: perf.current_index,
            }))
        }
        R::SetPerformanceControl { index } => {
            let perf = state.performance.as_mut().ok_or_else(|| missing("performance control"))?;
            if perf.controls.get(*index).is_none() {
                return Err(format!("performance index {} is outside the control set", index));
            }
            perf.current_index = *index;
            Ok(ActionResponse::Done)
        }

        // Core
        R::GetCoreStaticCaps => {
            let core = state.core.as_ref().ok_or_else(|| missing("core control"))?;
            Ok(ActionResponse::CoreStaticCaps(core.static_caps))
        }
        R::GetCoreDynamicCaps => {
            let core = state.core.as_ref().ok_or_else(|| missing("core control"))?;
            Ok(ActionResponse::CoreDynamicCaps(core.dynamic_caps))
        }
        R::GetCoreLpoPreference => {
            let core = state.core.as_ref().ok_or_else(|| missing("core control"))?;
            Ok(ActionResponse::CoreLpoPreference(core.lpo_preference))
        }
        R::GetCoreStatus => {
            let core = state.core.as_ref().ok_or_else(|| missing("core control"))?;
            Ok(ActionResponse::CoreStatus(CoreControlStatus {
                active_logical_processors: core.active_cores,
            }))
        }
        R::SetActiveCores { count } => {
            let core = state.core.as_mut().ok_or_else(|| missing("core control"))?;
            if *count == 0 || *count > core.static_caps.total_logical_processors {
                return Err(format!("{} active cores is outside the processor count", count));
            }
            core.active_cores = *count;
            Ok(ActionResponse::Done)
        }

        // Display
        R::GetDisplayCapabilities => {
            let display = state.display.as_ref().ok_or_else(|| missing("display control"))?;
            Ok(ActionResponse::DisplayCapabilities(display.capabilities))
        }
        R::GetDisplayStatus => {
            let display = state.display.as_ref().ok_or_else(|| missing("display control"))?;
            Ok(ActionResponse::DisplayStatus(DisplayControlStatus {
                brightness_limit_index: display.current_index,
            }))
        }
        R::SetDisplayControl { index } => {
            let display = state.display.as_mut().ok_or_else(|| missing("display control"))?;
            display.current_index = *index;
            Ok(ActionResponse::Done)
        }

        // Temperature
        R::GetTemperature => {
            let temp = state.temperature.as_ref().ok_or_else(|| missing("temperature"))?;
            Ok(ActionResponse::Temperature(temp.temperature))
        }
        R::GetTemperatureThresholds => {
            let temp = state.temperature.as_ref().ok_or_else(|| missing("temperature thresholds"))?;
            Ok(ActionResponse::TemperatureThresholds(temp.thresholds))
        }
        R::SetTemperatureThresholds { thresholds } => {
            let temp = state.temperature.as_mut().ok_or_else(|| missing("temperature thresholds"))?;
            temp.thresholds = *thresholds;
            Ok(ActionResponse::Done)
        }

        R::GetUtilization => state
            .utilization
            .map(ActionResponse::Utilization)
            .ok_or_else(|| missing("utilization")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform_with_core() -> SimulatedPlatform {
        let platform = SimulatedPlatform::new();
        platform.insert_domain(0, 0, SimulatedDomain::new().with_core(SimulatedCore::new(8, 2)));
        platform
    }

    #[test]
    fn test_writes_are_logged() {
        let platform = platform_with_core();
        platform
            .submit_request(0, 0, ActionRequest::SetActiveCores { count: 6 })
            .unwrap();
        platform.submit_request(0, 0, ActionRequest::GetCoreStatus).unwrap();

        assert_eq!(platform.write_count(0, 0), 1);
        assert_eq!(platform.domain(0, 0).unwrap().core.unwrap().active_cores, 6);
    }

    #[test]
    fn test_injected_failure() {
        let platform = platform_with_core();
        platform.fail_request(0, 0, "GetCoreStatus").unwrap();

        let err = platform.submit_request(0, 0, ActionRequest::GetCoreStatus).unwrap_err();
        assert!(err.is_transient());

        platform.clear_failures(0, 0).unwrap();
        assert!(platform.submit_request(0, 0, ActionRequest::GetCoreStatus).is_ok());
    }

    #[test]
    fn test_unknown_domain() {
        let platform = SimulatedPlatform::new();
        let err = platform.submit_request(4, 2, ActionRequest::GetTemperature).unwrap_err();
        assert!(matches!(err, DptfError::UnknownDomain { participant: 4, domain: 2 }));
    }

    #[test]
    fn test_performance_builder_layout() {
        let perf = SimulatedPerformance::new(4, 3);
        assert_eq!(perf.controls.len(), 7);
        assert_eq!(
            perf.controls.control_type(3),
            Some(PerformanceControlType::PerformanceState)
        );
        assert_eq!(perf.controls.control_type(4), Some(PerformanceControlType::ThrottleState));
        assert_eq!(perf.capabilities.current_lower_limit_index, 6);
    }

    #[test]
    fn test_locked_capabilities_reject_override() {
        let platform = SimulatedPlatform::new();
        platform.insert_domain(
            0,
            0,
            SimulatedDomain::new().with_power(SimulatedPower::pl1(
                Power::from_watts(5.0),
                Power::from_watts(25.0),
                Power::from_watts(1.0),
                Power::from_watts(12.0),
            )),
        );
        platform
            .submit_request(0, 0, ActionRequest::SetPowerCapsLock { locked: true })
            .unwrap();

        let result = platform.submit_request(
            0,
            0,
            ActionRequest::SetPowerControlCapabilities {
                capabilities: PowerControlDynamicCapsSet::new(),
            },
        );
        assert!(result.is_err());
    }
}
