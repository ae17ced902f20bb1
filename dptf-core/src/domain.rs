//! Per-domain owner of every facade and knob
//!
//! A `DomainProxy` builds knobs only for the interfaces its domain advertises.
//! Lifecycle fan-outs isolate failures per control, so one unsupported or
//! failing control never blocks the others.

use dptf_protocol::{DomainIndex, ParticipantIndex, Percentage, PerformanceControlType, TargetIndex};
use tracing::{debug, info, warn};

use crate::data::DomainProperties;
use crate::error::{DptfError, Result};
use crate::facade::{
    ControlFacade, ControlKind, CoreControlFacade, DisplayControlFacade, PerformanceControlFacade,
    PowerControlFacade, TemperatureControlFacade,
};
use crate::knob::{
    ControlKnob, CoreControlKnob, DisplayControlKnob, PerformanceControlKnob, PowerControlKnob,
};
use crate::services::DomainActions;
use crate::status::DomainStatus;

/// Controls touched by `initialize_controls`, in order
const INITIALIZED_CONTROLS: [ControlKind; 3] =
    [ControlKind::Performance, ControlKind::Power, ControlKind::Core];

/// Controls touched by `set_controls_to_max`, in order
const MAXED_CONTROLS: [ControlKind; 4] = [
    ControlKind::Performance,
    ControlKind::Power,
    ControlKind::Core,
    ControlKind::Display,
];

#[derive(Debug)]
pub struct DomainProxy {
    actions: DomainActions,
    properties: DomainProperties,
    power: Option<PowerControlKnob>,
    performance: Option<PerformanceControlKnob>,
    cores: Option<CoreControlKnob>,
    display: Option<DisplayControlKnob>,
    temperature: Option<TemperatureControlFacade>,
}

impl DomainProxy {
    pub fn new(actions: DomainActions, properties: DomainProperties) -> Self {
        let power = properties.implements_power_control().then(|| {
            PowerControlKnob::new(PowerControlFacade::new(actions.clone(), properties.clone()))
        });
        let performance = properties.implements_performance_control().then(|| {
            PerformanceControlKnob::new(PerformanceControlFacade::new(actions.clone(), properties.clone()))
        });
        let cores = properties.implements_core_control().then(|| {
            CoreControlKnob::new(CoreControlFacade::new(actions.clone(), properties.clone()))
        });
        let display = properties.implements_display_control().then(|| {
            DisplayControlKnob::new(DisplayControlFacade::new(actions.clone(), properties.clone()))
        });
        let temperature = (properties.implements_temperature() || properties.implements_temperature_threshold())
            .then(|| TemperatureControlFacade::new(actions.clone(), properties.clone()));

        debug!(
            "Participant {} domain {} ({}): bound with interfaces {:?}",
            actions.participant(),
            actions.domain(),
            properties.name,
            properties.interfaces
        );

        Self {
            actions,
            properties,
            power,
            performance,
            cores,
            display,
            temperature,
        }
    }

    pub fn participant(&self) -> ParticipantIndex {
        self.actions.participant()
    }

    pub fn domain(&self) -> DomainIndex {
        self.actions.domain()
    }

    pub fn properties(&self) -> &DomainProperties {
        &self.properties
    }

    fn unsupported(&self, kind: ControlKind) -> DptfError {
        DptfError::not_supported(kind.to_string(), self.participant(), self.domain())
    }

    // ============================================================================
    // Accessors
    // ============================================================================

    pub fn power(&self) -> Result<&PowerControlKnob> {
        self.power.as_ref().ok_or_else(|| self.unsupported(ControlKind::Power))
    }

    pub fn power_mut(&mut self) -> Result<&mut PowerControlKnob> {
        let err = self.unsupported(ControlKind::Power);
        self.power.as_mut().ok_or(err)
    }

    pub fn performance(&self) -> Result<&PerformanceControlKnob> {
        self.performance
            .as_ref()
            .ok_or_else(|| self.unsupported(ControlKind::Performance))
    }

    pub fn performance_mut(&mut self) -> Result<&mut PerformanceControlKnob> {
        let err = self.unsupported(ControlKind::Performance);
        self.performance.as_mut().ok_or(err)
    }

    pub fn cores(&self) -> Result<&CoreControlKnob> {
        self.cores.as_ref().ok_or_else(|| self.unsupported(ControlKind::Core))
    }

    pub fn cores_mut(&mut self) -> Result<&mut CoreControlKnob> {
        let err = self.unsupported(ControlKind::Core);
        self.cores.as_mut().ok_or(err)
    }

    pub fn display(&self) -> Result<&DisplayControlKnob> {
        self.display.as_ref().ok_or_else(|| self.unsupported(ControlKind::Display))
    }

    pub fn display_mut(&mut self) -> Result<&mut DisplayControlKnob> {
        let err = self.unsupported(ControlKind::Display);
        self.display.as_mut().ok_or(err)
    }

    pub fn temperature(&self) -> Result<&TemperatureControlFacade> {
        self.temperature
            .as_ref()
            .ok_or_else(|| self.unsupported(ControlKind::Temperature))
    }

    fn facade(&self, kind: ControlKind) -> Option<&dyn ControlFacade> {
        match kind {
            ControlKind::Power => self.power.as_ref().map(|k| k.facade() as &dyn ControlFacade),
            ControlKind::Performance => self.performance.as_ref().map(|k| k.facade() as &dyn ControlFacade),
            ControlKind::Core => self.cores.as_ref().map(|k| k.facade() as &dyn ControlFacade),
            ControlKind::Display => self.display.as_ref().map(|k| k.facade() as &dyn ControlFacade),
            ControlKind::Temperature => None,
        }
    }

    // ============================================================================
    // Lifecycle
    // ============================================================================

    fn for_each_control<F>(&self, kinds: &[ControlKind], operation: &str, apply: F)
    where
        F: Fn(&dyn ControlFacade) -> Result<()>,
    {
        for kind in kinds {
            let Some(facade) = self.facade(*kind) else {
                continue;
            };
            if let Err(e) = apply(facade) {
                if e.is_not_supported() {
                    debug!("{} {}: {}", kind, operation, e);
                } else {
                    warn!(
                        "Participant {} domain {}: {} {} failed: {}",
                        self.participant(),
                        self.domain(),
                        kind,
                        operation,
                        e
                    );
                }
            }
        }
    }

    /// Bring performance, power and cores to their starting values
    pub fn initialize_controls(&self) {
        self.for_each_control(&INITIALIZED_CONTROLS, "initialization", |facade| {
            facade.initialize_controls_if_needed()
        });
    }

    pub fn set_controls_to_max(&self) {
        self.for_each_control(&MAXED_CONTROLS, "set to max", |facade| facade.set_controls_to_max());
    }

    /// Disable both temperature notification bounds, best effort
    pub fn clear_temperature_thresholds(&self) {
        let Some(temperature) = &self.temperature else {
            return;
        };
        if let Err(e) = temperature.set_temperature_notification_thresholds(None, None) {
            debug!(
                "Participant {} domain {}: could not clear temperature thresholds: {}",
                self.participant(),
                self.domain(),
                e
            );
        }
    }

    pub fn utilization_status(&self) -> Result<Percentage> {
        if !self.properties.implements_utilization() {
            return Err(DptfError::not_supported("Utilization", self.participant(), self.domain()));
        }
        self.actions.utilization()
    }

    pub fn set_tstate_utilization_threshold(&mut self, threshold: Percentage) {
        if let Some(performance) = self.performance.as_mut() {
            performance.set_tstate_utilization_threshold(threshold);
        }
    }

    /// Drop cached capabilities of one control and clamp its stored requests
    /// into the new ones. Nothing is written until the next commit.
    pub fn on_capabilities_changed(&mut self, kind: ControlKind) {
        info!(
            "Participant {} domain {}: {} capabilities changed",
            self.participant(),
            self.domain(),
            kind
        );
        if kind == ControlKind::Temperature {
            if let Some(temperature) = &self.temperature {
                temperature.invalidate_thresholds();
            }
            return;
        }

        if let Some(facade) = self.facade(kind) {
            if let Err(e) = facade.refresh_capabilities() {
                warn!("{} capabilities could not be refreshed: {}", kind, e);
            }
        }
        let adjusted = match kind {
            ControlKind::Power => self.power.as_mut().map(|k| k.adjust_requests_to_capabilities()),
            ControlKind::Performance => self
                .performance
                .as_mut()
                .map(|k| k.adjust_requests_to_capabilities()),
            ControlKind::Core => self.cores.as_mut().map(|k| k.adjust_requests_to_capabilities()),
            ControlKind::Display => self.display.as_mut().map(|k| k.adjust_requests_to_capabilities()),
            ControlKind::Temperature => None,
        };
        if let Some(Err(e)) = adjusted {
            warn!("{} requests could not be adjusted: {}", kind, e);
        }
    }

    // ============================================================================
    // Arbitration
    // ============================================================================

    /// Tighten the first control that can absorb a step for `target`: power,
    /// then P-states (parking cores alongside), cores, T-states, display.
    /// Returns whether any control took the step.
    pub fn request_limit(&mut self, target: TargetIndex) -> bool {
        let absorbed = self.limit_power(target)
            || self.limit_pstates_with_cores(target)
            || self.limit_cores(target)
            || self.limit_tstates(target)
            || self.limit_display(target);
        if !absorbed {
            debug!(
                "Participant {} domain {}: no control can limit further for target {}",
                self.participant(),
                self.domain(),
                target
            );
        }
        absorbed
    }

    /// Relax the first control that can give back a step, in the reverse of
    /// the limit order
    pub fn request_unlimit(&mut self, target: TargetIndex) -> bool {
        self.unlimit_display(target)
            || self.unlimit_tstates(target)
            || self.unlimit_cores_with_pstates(target)
            || self.unlimit_pstates(target)
            || self.unlimit_power(target)
    }

    fn limit_power(&mut self, target: TargetIndex) -> bool {
        self.power.as_mut().is_some_and(|knob| limit_if_possible(knob, target))
    }

    fn limit_pstates_with_cores(&mut self, target: TargetIndex) -> bool {
        let absorbed = self
            .performance
            .as_mut()
            .is_some_and(|knob| limit_if_possible(&mut knob.pstates(), target));
        if !absorbed {
            return false;
        }
        if self.cores_can_limit(target) {
            if let Some(cores) = self.cores.as_mut() {
                if let Err(e) = cores.limit(target) {
                    debug!("Cores could not follow P-states for target {}: {}", target, e);
                }
            }
        }
        true
    }

    fn limit_cores(&mut self, target: TargetIndex) -> bool {
        if !self.cores_can_limit(target) {
            return false;
        }
        let Some(cores) = self.cores.as_mut() else {
            return false;
        };
        match cores.limit(target) {
            Ok(()) => true,
            Err(e) => {
                debug!("Cores limit failed for target {}: {}", target, e);
                false
            }
        }
    }

    /// Cores park only once the target's P-state request has reached the LPO
    /// start P-state. Without performance control the LPO start stands in.
    fn cores_can_limit(&self, target: TargetIndex) -> bool {
        let Some(cores) = self.cores.as_ref() else {
            return false;
        };
        match self.performance.as_ref().map(|knob| knob.target_request(target)) {
            Some(Ok(pstate)) => cores.can_limit_with_performance(target, pstate),
            Some(Err(e)) => {
                debug!("Cores cannot limit for target {}, P-state request unknown: {}", target, e);
                false
            }
            None => cores.can_limit(target),
        }
    }

    fn limit_tstates(&mut self, target: TargetIndex) -> bool {
        self.performance
            .as_mut()
            .is_some_and(|knob| limit_if_possible(&mut knob.tstates(), target))
    }

    fn limit_display(&mut self, target: TargetIndex) -> bool {
        self.display.as_mut().is_some_and(|knob| limit_if_possible(knob, target))
    }

    fn unlimit_display(&mut self, target: TargetIndex) -> bool {
        self.display.as_mut().is_some_and(|knob| unlimit_if_possible(knob, target))
    }

    fn unlimit_tstates(&mut self, target: TargetIndex) -> bool {
        self.performance
            .as_mut()
            .is_some_and(|knob| unlimit_if_possible(&mut knob.tstates(), target))
    }

    fn unlimit_cores_with_pstates(&mut self, target: TargetIndex) -> bool {
        let Some(cores) = self.cores.as_mut() else {
            return false;
        };
        if !unlimit_if_possible(cores, target) {
            return false;
        }
        if let Some(performance) = self.performance.as_mut() {
            let mut pstates = performance.pstates();
            if pstates.can_unlimit(target) {
                if let Err(e) = pstates.unlimit(target) {
                    debug!("P-states could not follow cores for target {}: {}", target, e);
                }
            }
        }
        true
    }

    fn unlimit_pstates(&mut self, target: TargetIndex) -> bool {
        self.performance
            .as_mut()
            .is_some_and(|knob| unlimit_if_possible(&mut knob.pstates(), target))
    }

    fn unlimit_power(&mut self, target: TargetIndex) -> bool {
        self.power.as_mut().is_some_and(|knob| unlimit_if_possible(knob, target))
    }

    /// Whether any control could take another limit step for `target`
    pub fn can_limit(&mut self, target: TargetIndex) -> bool {
        self.power.as_ref().is_some_and(|k| k.can_limit(target))
            || self.performance.as_mut().is_some_and(|k| {
                k.pstates().can_limit(target) || k.tstates().can_limit(target)
            })
            || self.cores_can_limit(target)
            || self.display.as_ref().is_some_and(|k| k.can_limit(target))
    }

    /// Whether any control could give back a step for `target`
    pub fn can_unlimit(&mut self, target: TargetIndex) -> bool {
        self.power.as_ref().is_some_and(|k| k.can_unlimit(target))
            || self.performance.as_mut().is_some_and(|k| {
                k.pstates().can_unlimit(target) || k.tstates().can_unlimit(target)
            })
            || self.cores.as_ref().is_some_and(|k| k.can_unlimit(target))
            || self.display.as_ref().is_some_and(|k| k.can_unlimit(target))
    }

    /// Commit every knob. Stops at the first failure.
    pub fn commit_limits(&mut self) -> Result<bool> {
        let mut committed = false;
        if let Some(knob) = self.power.as_mut() {
            committed |= knob.commit_setting()?;
        }
        if let Some(knob) = self.performance.as_mut() {
            committed |= knob.commit_setting()?;
        }
        if let Some(knob) = self.cores.as_mut() {
            committed |= knob.commit_setting()?;
        }
        if let Some(knob) = self.display.as_mut() {
            committed |= knob.commit_setting()?;
        }
        Ok(committed)
    }

    pub fn clear_all_requests_for_target(&mut self, target: TargetIndex) {
        if let Some(knob) = self.power.as_mut() {
            knob.clear_request_for_target(target);
        }
        if let Some(knob) = self.performance.as_mut() {
            knob.clear_request_for_target(target);
        }
        if let Some(knob) = self.cores.as_mut() {
            knob.clear_request_for_target(target);
        }
        if let Some(knob) = self.display.as_mut() {
            knob.clear_request_for_target(target);
        }
    }

    pub fn clear_all_control_knob_requests(&mut self) {
        if let Some(knob) = self.power.as_mut() {
            knob.clear_all_requests();
        }
        if let Some(knob) = self.performance.as_mut() {
            knob.clear_all_requests();
        }
        if let Some(knob) = self.cores.as_mut() {
            knob.clear_all_requests();
        }
        if let Some(knob) = self.display.as_mut() {
            knob.clear_all_requests();
        }
    }

    /// Clamp every knob's requests into its current capabilities
    pub fn adjust_requests_to_capabilities(&mut self) {
        let results = [
            (ControlKind::Power, self.power.as_mut().map(|k| k.adjust_requests_to_capabilities())),
            (
                ControlKind::Performance,
                self.performance.as_mut().map(|k| k.adjust_requests_to_capabilities()),
            ),
            (ControlKind::Core, self.cores.as_mut().map(|k| k.adjust_requests_to_capabilities())),
            (ControlKind::Display, self.display.as_mut().map(|k| k.adjust_requests_to_capabilities())),
        ];
        for (kind, result) in results {
            if let Some(Err(e)) = result {
                warn!("{} requests could not be adjusted: {}", kind, e);
            }
        }
    }

    pub fn status(&self) -> DomainStatus {
        let temperature = self.temperature.as_ref();
        DomainStatus {
            participant: self.participant(),
            domain: self.domain(),
            name: self.properties.name.clone(),
            domain_type: self.properties.domain_type,
            interfaces: self.properties.interfaces,
            power: self.power.as_ref().map(|k| k.status()),
            pstates: self
                .performance
                .as_ref()
                .map(|k| k.status_for(PerformanceControlType::PerformanceState)),
            tstates: self
                .performance
                .as_ref()
                .map(|k| k.status_for(PerformanceControlType::ThrottleState)),
            cores: self.cores.as_ref().map(|k| k.status()),
            display: self.display.as_ref().map(|k| k.status()),
            temperature: temperature.and_then(|t| t.temperature().ok()),
            temperature_thresholds: temperature.and_then(|t| t.thresholds().ok()),
            utilization: self.utilization_status().ok(),
        }
    }
}

fn limit_if_possible<K: ControlKnob>(knob: &mut K, target: TargetIndex) -> bool {
    if !knob.can_limit(target) {
        return false;
    }
    match knob.limit(target) {
        Ok(()) => true,
        Err(e) => {
            debug!("{} limit failed for target {}: {}", knob.name(), target, e);
            false
        }
    }
}

fn unlimit_if_possible<K: ControlKnob>(knob: &mut K, target: TargetIndex) -> bool {
    if !knob.can_unlimit(target) {
        return false;
    }
    match knob.unlimit(target) {
        Ok(()) => true,
        Err(e) => {
            debug!("{} unlimit failed for target {}: {}", knob.name(), target, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DomainInterfaces, DomainType};
    use crate::simulator::{SimulatedCore, SimulatedDomain, SimulatedPerformance, SimulatedPlatform};
    use crate::test_utils::{
        cpu_interfaces, create_mock_cpu_domain, create_mock_display_domain, domain_actions, watts,
    };
    use dptf_protocol::{PowerControlType, Temperature};
    use std::sync::Arc;

    fn proxy_for(domain: SimulatedDomain, interfaces: DomainInterfaces) -> (Arc<SimulatedPlatform>, DomainProxy) {
        let (platform, actions) = domain_actions(domain);
        let properties = DomainProperties::new("CPU", DomainType::Processor, interfaces);
        (platform, DomainProxy::new(actions, properties))
    }

    fn cpu_proxy() -> (Arc<SimulatedPlatform>, DomainProxy) {
        let (platform, proxy) = proxy_for(create_mock_cpu_domain(), cpu_interfaces());
        proxy.initialize_controls();
        platform.clear_writes();
        (platform, proxy)
    }

    #[test]
    fn test_unsupported_core_does_not_block_power_initialization() {
        let mut domain = create_mock_cpu_domain();
        domain
            .power
            .as_mut()
            .unwrap()
            .limits
            .insert(PowerControlType::Pl1, watts(10.0));
        let (_, proxy) = proxy_for(
            domain,
            DomainInterfaces::POWER_CONTROL | DomainInterfaces::POWER_STATUS,
        );

        proxy.initialize_controls();

        assert!(proxy.cores().unwrap_err().is_not_supported());
        let power = proxy.power().unwrap().facade();
        assert_eq!(power.power_limit(PowerControlType::Pl1).unwrap(), watts(25.0));
    }

    #[test]
    fn test_failing_control_does_not_block_siblings() {
        let (platform, proxy) = proxy_for(create_mock_cpu_domain(), cpu_interfaces());
        platform.fail_request(0, 0, "GetCoreDynamicCaps").unwrap();
        platform.fail_request(0, 0, "GetPerformanceDynamicCaps").unwrap();

        proxy.initialize_controls();

        let power = proxy.power().unwrap().facade();
        assert_eq!(power.power_limit(PowerControlType::Pl1).unwrap(), watts(25.0));
        assert!(power.controls_initialized());
    }

    #[test]
    fn test_limit_order_power_first() {
        let (_, mut proxy) = cpu_proxy();
        assert!(proxy.request_limit(1));
        assert_eq!(proxy.power().unwrap().target_request(1).unwrap(), watts(11.0));
        assert_eq!(proxy.performance().unwrap().target_request(1).unwrap(), 0);
    }

    #[test]
    fn test_limit_falls_through_to_pstates_and_cores() {
        let (_, mut proxy) = cpu_proxy();
        // 25 W down to 5 W takes seven steps
        for _ in 0..7 {
            assert!(proxy.request_limit(1));
        }
        assert!(!proxy.power().unwrap().can_limit(1));

        assert!(proxy.request_limit(1));
        assert_eq!(proxy.performance().unwrap().target_request(1).unwrap(), 1);
        assert_eq!(proxy.cores().unwrap().target_request(1).unwrap(), 6);
    }

    /// P-states pinned at index 0, eight cores with LPO starting at `start_pstate`
    fn pinned_pstate_proxy(start_pstate: u32) -> DomainProxy {
        let mut performance = SimulatedPerformance::new(4, 0);
        performance.capabilities.current_lower_limit_index = 0;
        let mut core = SimulatedCore::new(8, 2);
        core.lpo_preference.start_pstate_index = start_pstate;
        let domain = SimulatedDomain::new().with_performance(performance).with_core(core);
        let (_, proxy) = proxy_for(
            domain,
            DomainInterfaces::PERFORMANCE_CONTROL | DomainInterfaces::CORE_CONTROL,
        );
        proxy
    }

    #[test]
    fn test_cores_wait_for_lpo_start_pstate() {
        let mut proxy = pinned_pstate_proxy(1);
        assert!(!proxy.can_limit(1));
        assert!(!proxy.request_limit(1));
        assert_eq!(proxy.cores().unwrap().target_request(1).unwrap(), 8);

        let mut proxy = pinned_pstate_proxy(0);
        assert!(proxy.can_limit(1));
        assert!(proxy.request_limit(1));
        assert_eq!(proxy.cores().unwrap().target_request(1).unwrap(), 6);
    }

    #[test]
    fn test_unlimit_reverses_order() {
        let (_, mut proxy) = cpu_proxy();
        for _ in 0..8 {
            proxy.request_limit(1);
        }
        assert!(proxy.request_unlimit(1));
        assert_eq!(proxy.cores().unwrap().target_request(1).unwrap(), 8);
        assert_eq!(proxy.performance().unwrap().target_request(1).unwrap(), 0);
        assert_eq!(proxy.power().unwrap().target_request(1).unwrap(), watts(5.0));

        assert!(proxy.request_unlimit(1));
        assert_eq!(proxy.power().unwrap().target_request(1).unwrap(), watts(6.0));
    }

    #[test]
    fn test_commit_limits_writes_once() {
        let (platform, mut proxy) = cpu_proxy();
        for _ in 0..8 {
            proxy.request_limit(1);
        }
        assert!(proxy.commit_limits().unwrap());
        let writes = platform.write_count(0, 0);
        assert_eq!(writes, 3);
        assert!(!proxy.commit_limits().unwrap());
        assert_eq!(platform.write_count(0, 0), writes);
    }

    #[test]
    fn test_commit_failure_propagates() {
        let (platform, mut proxy) = cpu_proxy();
        proxy.request_limit(1);
        platform.fail_request(0, 0, "SetPowerLimit").unwrap();
        let err = proxy.commit_limits().unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_clear_requests_for_target() {
        let (_, mut proxy) = cpu_proxy();
        for _ in 0..8 {
            proxy.request_limit(1);
        }
        proxy.request_limit(2);
        proxy.clear_all_requests_for_target(1);

        assert_eq!(proxy.power().unwrap().target_request(1).unwrap(), watts(25.0));
        assert_eq!(proxy.cores().unwrap().target_request(1).unwrap(), 8);
        assert_eq!(proxy.power().unwrap().target_request(2).unwrap(), watts(11.0));

        proxy.clear_all_control_knob_requests();
        assert!(!proxy.power().unwrap().has_been_limited());
        assert_eq!(proxy.power().unwrap().target_request(2).unwrap(), watts(25.0));
    }

    #[test]
    fn test_capability_change_resnaps_requests() {
        let (platform, mut proxy) = cpu_proxy();
        for _ in 0..7 {
            proxy.request_limit(1);
        }
        platform
            .update_domain(0, 0, |d| {
                let capabilities = &mut d.power.as_mut().unwrap().capabilities;
                let mut caps = *capabilities.capability(PowerControlType::Pl1).unwrap();
                caps.min_power_limit = watts(9.0);
                capabilities.set_capability(PowerControlType::Pl1, caps);
            })
            .unwrap();

        proxy.on_capabilities_changed(ControlKind::Power);
        assert_eq!(proxy.power().unwrap().target_request(1).unwrap(), watts(9.0));
        proxy.commit_limits().unwrap();
        let power = proxy.power().unwrap().facade();
        assert_eq!(power.power_limit(PowerControlType::Pl1).unwrap(), watts(9.0));
    }

    #[test]
    fn test_display_only_domain() {
        let (platform, mut proxy) = proxy_for(create_mock_display_domain(3), DomainInterfaces::DISPLAY_CONTROL);
        proxy.initialize_controls();
        assert_eq!(platform.write_count(0, 0), 0);

        assert!(proxy.can_limit(1));
        assert!(proxy.request_limit(1));
        assert!(proxy.commit_limits().unwrap());
        assert_eq!(platform.domain(0, 0).unwrap().display.unwrap().current_index, 4);
        assert!(proxy.power().unwrap_err().is_not_supported());
    }

    #[test]
    fn test_clear_temperature_thresholds() {
        let (platform, proxy) = cpu_proxy();
        proxy
            .temperature()
            .unwrap()
            .set_temperature_notification_thresholds(
                Some(Temperature::from_celsius(40.0)),
                Some(Temperature::from_celsius(70.0)),
            )
            .unwrap();

        proxy.clear_temperature_thresholds();
        let thresholds = platform.domain(0, 0).unwrap().temperature.unwrap().thresholds;
        assert_eq!(thresholds.aux0, None);
        assert_eq!(thresholds.aux1, None);
    }

    #[test]
    fn test_status_snapshot() {
        let (_, mut proxy) = cpu_proxy();
        proxy.request_limit(4);
        let status = proxy.status();
        assert_eq!(status.power.as_ref().unwrap().requests.get(&4), Some(&watts(11.0)));
        assert!(status.display.is_none());
        assert_eq!(status.utilization, Some(Percentage::from_fraction(0.8)));
        assert_eq!(status.temperature, Some(Temperature::from_celsius(55.0)));
    }
}
