//! Package power limit facade

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use dptf_protocol::{Power, PowerControlDynamicCaps, PowerControlDynamicCapsSet, PowerControlType};
use tracing::{debug, info, warn};

use super::{ensure_supported, ControlFacade, ControlKind};
use crate::cache::CachedProperty;
use crate::data::DomainProperties;
use crate::error::{DptfError, Result};
use crate::services::DomainActions;

#[derive(Debug)]
pub struct PowerControlFacade {
    actions: DomainActions,
    properties: DomainProperties,
    capabilities: CachedProperty<PowerControlDynamicCapsSet>,
    controls_initialized: Cell<bool>,
    last_set_limits: RefCell<BTreeMap<PowerControlType, Power>>,
    last_set_time_windows: RefCell<BTreeMap<PowerControlType, u64>>,
}

impl PowerControlFacade {
    pub fn new(actions: DomainActions, properties: DomainProperties) -> Self {
        Self {
            actions,
            properties,
            capabilities: CachedProperty::new(),
            controls_initialized: Cell::new(false),
            last_set_limits: RefCell::new(BTreeMap::new()),
            last_set_time_windows: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn supports_power_controls(&self) -> bool {
        self.properties.implements_power_control()
    }

    pub fn supports_power_status(&self) -> bool {
        self.properties.implements_power_status()
    }

    /// `NotSupported` unless the domain implements this control
    pub fn require_supported(&self) -> Result<()> {
        ensure_supported(self.supports_power_controls(), ControlKind::Power, &self.actions)
    }

    // ========================================================================
    // Capabilities
    // ========================================================================

    pub fn capabilities(&self) -> Result<PowerControlDynamicCapsSet> {
        self.require_supported()?;
        self.capabilities
            .get_or_fetch(|| self.actions.power_control_capabilities())
    }

    /// Capabilities of one limit slot
    pub fn capability(&self, control_type: PowerControlType) -> Result<PowerControlDynamicCaps> {
        self.capabilities()?
            .capability(control_type)
            .copied()
            .ok_or_else(|| {
                DptfError::capability_missing(
                    control_type.to_string(),
                    self.actions.participant(),
                    self.actions.domain(),
                )
            })
    }

    /// Override the capabilities of one slot; other slots are left as reported
    pub fn set_capability(&self, control_type: PowerControlType, caps: PowerControlDynamicCaps) -> Result<()> {
        self.require_supported()?;
        let mut override_set = PowerControlDynamicCapsSet::new();
        override_set.set_capability(control_type, caps);
        self.actions.set_power_control_capabilities(override_set)?;
        self.capabilities.invalidate();
        info!(
            "Participant {} domain {}: {} capabilities set to [{}, {}] step {}",
            self.actions.participant(),
            self.actions.domain(),
            control_type,
            caps.min_power_limit,
            caps.max_power_limit,
            caps.power_step_size
        );
        Ok(())
    }

    pub fn lock_capabilities(&self) -> Result<()> {
        self.require_supported()?;
        self.actions.set_power_caps_lock(true)
    }

    pub fn unlock_capabilities(&self) -> Result<()> {
        self.require_supported()?;
        self.actions.set_power_caps_lock(false)
    }

    // ========================================================================
    // Power limits
    // ========================================================================

    /// Last limit this process programmed, or the hardware value if none
    pub fn power_limit(&self, control_type: PowerControlType) -> Result<Power> {
        self.require_supported()?;
        if let Some(limit) = self.last_set_limits.borrow().get(&control_type) {
            return Ok(*limit);
        }
        self.live_power_limit(control_type)
    }

    /// Read the limit back from hardware, bypassing the last-set cache
    pub fn live_power_limit(&self, control_type: PowerControlType) -> Result<Power> {
        self.require_supported()?;
        self.actions.power_limit(control_type)
    }

    pub fn set_power_limit(&self, control_type: PowerControlType, limit: Power) -> Result<()> {
        self.require_supported()?;
        if control_type == PowerControlType::Pl1 {
            self.ensure_pl1_time_window();
        }
        self.actions.set_power_limit(control_type, limit)?;
        self.last_set_limits.borrow_mut().insert(control_type, limit);
        debug!(
            "Participant {} domain {}: {} set to {}",
            self.actions.participant(),
            self.actions.domain(),
            control_type,
            limit
        );
        Ok(())
    }

    /// A PL1 limit with a zero time window is ignored by firmware, so program
    /// the maximum window first. Best effort.
    fn ensure_pl1_time_window(&self) {
        let window = match self.power_limit_time_window_ms(PowerControlType::Pl1) {
            Ok(window) => window,
            Err(e) => {
                warn!(
                    "Failed to get PL1 time window for participant {}: {}",
                    self.actions.participant(),
                    e
                );
                0
            }
        };
        if window != 0 {
            return;
        }

        let result = self.capability(PowerControlType::Pl1).and_then(|caps| {
            self.actions
                .set_power_limit_time_window_ms(PowerControlType::Pl1, caps.max_time_window_ms)?;
            self.last_set_time_windows
                .borrow_mut()
                .insert(PowerControlType::Pl1, caps.max_time_window_ms);
            Ok(())
        });
        if let Err(e) = result {
            warn!(
                "Failed to set PL1 time window for participant {}: {}",
                self.actions.participant(),
                e
            );
        }
    }

    pub fn power_limit_time_window_ms(&self, control_type: PowerControlType) -> Result<u64> {
        self.require_supported()?;
        if let Some(window) = self.last_set_time_windows.borrow().get(&control_type) {
            return Ok(*window);
        }
        self.actions.power_limit_time_window_ms(control_type)
    }

    pub fn set_power_limit_time_window_ms(&self, control_type: PowerControlType, window_ms: u64) -> Result<()> {
        self.require_supported()?;
        if control_type == PowerControlType::Pl1 {
            self.ensure_pl1_limit();
        }
        self.actions
            .set_power_limit_time_window_ms(control_type, window_ms)?;
        self.last_set_time_windows.borrow_mut().insert(control_type, window_ms);
        Ok(())
    }

    /// A zero PL1 limit disables PL1; program the maximum before touching its
    /// time window. Best effort.
    fn ensure_pl1_limit(&self) {
        let limit = self.power_limit(PowerControlType::Pl1).unwrap_or(Power::ZERO);
        if limit != Power::ZERO {
            return;
        }

        let result = self.capability(PowerControlType::Pl1).and_then(|caps| {
            self.actions
                .set_power_limit(PowerControlType::Pl1, caps.max_power_limit)?;
            self.last_set_limits
                .borrow_mut()
                .insert(PowerControlType::Pl1, caps.max_power_limit);
            Ok(())
        });
        if let Err(e) = result {
            warn!(
                "Failed to set PL1 for participant {}: {}",
                self.actions.participant(),
                e
            );
        }
    }

    // ========================================================================
    // Power status
    // ========================================================================

    pub fn current_power(&self) -> Result<Power> {
        ensure_supported(self.supports_power_status(), ControlKind::Power, &self.actions)?;
        self.actions.current_power()
    }

    /// Average package power.
    ///
    /// Falls back to the instantaneous reading when PL1 has no capabilities,
    /// and to the PL1 maximum when the domain cannot report power at all.
    pub fn average_power(&self) -> Result<Power> {
        self.require_supported()?;
        let caps_set = self.capabilities()?;
        let pl1 = caps_set.capability(PowerControlType::Pl1);

        match (pl1, self.supports_power_status()) {
            (Some(_), true) => self.actions.average_power(),
            (None, true) => self.current_power(),
            (Some(caps), false) => Ok(caps.max_power_limit),
            (None, false) => Err(DptfError::not_supported(
                "Power status",
                self.actions.participant(),
                self.actions.domain(),
            )),
        }
    }

    // ========================================================================
    // True-up
    // ========================================================================

    /// Re-program any last-set limit or time window that the current
    /// capabilities no longer allow
    pub fn set_values_within_capabilities(&self) -> Result<()> {
        let caps_set = self.capabilities()?;

        let limits: Vec<(PowerControlType, Power)> = self
            .last_set_limits
            .borrow()
            .iter()
            .map(|(control_type, limit)| (*control_type, *limit))
            .collect();
        for (control_type, limit) in limits {
            let snapped = caps_set.snap_to_capability(control_type, limit);
            if snapped != limit {
                info!(
                    "Participant {} domain {}: {} {} outside capabilities, now {}",
                    self.actions.participant(),
                    self.actions.domain(),
                    control_type,
                    limit,
                    snapped
                );
                self.set_power_limit(control_type, snapped)?;
            }
        }

        let windows: Vec<(PowerControlType, u64)> = self
            .last_set_time_windows
            .borrow()
            .iter()
            .map(|(control_type, window)| (*control_type, *window))
            .collect();
        for (control_type, window) in windows {
            if let Some(caps) = caps_set.capability(control_type) {
                let snapped = caps.snap_time_window_ms(window);
                if snapped != window {
                    self.set_power_limit_time_window_ms(control_type, snapped)?;
                }
            }
        }
        Ok(())
    }

    pub fn last_set_limits(&self) -> BTreeMap<PowerControlType, Power> {
        self.last_set_limits.borrow().clone()
    }

    pub fn controls_initialized(&self) -> bool {
        self.controls_initialized.get()
    }
}

impl ControlFacade for PowerControlFacade {
    fn kind(&self) -> ControlKind {
        ControlKind::Power
    }

    fn is_supported(&self) -> bool {
        self.supports_power_controls()
    }

    fn initialize_controls_if_needed(&self) -> Result<()> {
        self.require_supported()?;
        if self.controls_initialized() {
            return self.set_values_within_capabilities();
        }
        self.set_controls_to_max()?;
        self.controls_initialized.set(true);
        Ok(())
    }

    /// Only PL1 is under policy control
    fn set_controls_to_max(&self) -> Result<()> {
        self.require_supported()?;
        if let Some(caps) = self.capabilities()?.capability(PowerControlType::Pl1) {
            self.set_power_limit(PowerControlType::Pl1, caps.max_power_limit)?;
        }
        Ok(())
    }

    fn refresh_capabilities(&self) -> Result<()> {
        self.capabilities.invalidate();
        self.capabilities().map(|_| ())
    }

    fn invalidate_capabilities(&self) {
        self.capabilities.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DomainInterfaces;
    use crate::simulator::{SimulatedDomain, SimulatedPlatform, SimulatedPower};
    use crate::test_utils::{domain_actions, properties, watts, MockActions};
    use dptf_protocol::{ActionRequest, ActionResponse};
    use std::sync::Arc;

    fn simulated_facade(interfaces: DomainInterfaces) -> (Arc<SimulatedPlatform>, PowerControlFacade) {
        let power = SimulatedPower::pl1(watts(5.0), watts(25.0), watts(1.0), watts(12.0));
        let (platform, actions) = domain_actions(SimulatedDomain::new().with_power(power));
        (platform, PowerControlFacade::new(actions, properties(interfaces)))
    }

    #[test]
    fn test_unsupported_commands_fail_distinguishably() {
        let (_, facade) = simulated_facade(DomainInterfaces::TEMPERATURE);
        assert!(!facade.supports_power_controls());
        assert!(facade.set_controls_to_max().unwrap_err().is_not_supported());
        assert!(facade.power_limit(PowerControlType::Pl1).unwrap_err().is_not_supported());
    }

    #[test]
    fn test_initialize_sets_max_once_then_trues_up() {
        let (platform, facade) = simulated_facade(DomainInterfaces::POWER_CONTROL);
        facade.set_power_limit(PowerControlType::Pl1, watts(20.0)).unwrap();

        facade.initialize_controls_if_needed().unwrap();
        assert_eq!(facade.power_limit(PowerControlType::Pl1).unwrap(), watts(25.0));

        facade.set_power_limit(PowerControlType::Pl1, watts(22.0)).unwrap();
        platform
            .update_domain(0, 0, |d| {
                let power = d.power.as_mut().unwrap();
                power.capabilities.set_capability(
                    PowerControlType::Pl1,
                    PowerControlDynamicCaps::new(watts(5.0), watts(18.0), watts(1.0))
                        .with_time_window_ms(1_000, 56_000),
                );
            })
            .unwrap();
        facade.invalidate_capabilities();

        facade.initialize_controls_if_needed().unwrap();
        assert_eq!(facade.power_limit(PowerControlType::Pl1).unwrap(), watts(18.0));
    }

    #[test]
    fn test_pl1_write_programs_missing_time_window() {
        let (platform, facade) = simulated_facade(DomainInterfaces::POWER_CONTROL);
        facade.set_power_limit(PowerControlType::Pl1, watts(15.0)).unwrap();

        let state = platform.domain(0, 0).unwrap().power.unwrap();
        assert_eq!(state.time_windows_ms.get(&PowerControlType::Pl1), Some(&56_000));
        assert_eq!(state.limits.get(&PowerControlType::Pl1), Some(&watts(15.0)));
    }

    #[test]
    fn test_time_window_write_keeps_programmed_pl1() {
        let (platform, facade) = simulated_facade(DomainInterfaces::POWER_CONTROL);
        facade.set_power_limit(PowerControlType::Pl1, watts(15.0)).unwrap();
        facade
            .set_power_limit_time_window_ms(PowerControlType::Pl1, 28_000)
            .unwrap();

        assert_eq!(facade.power_limit_time_window_ms(PowerControlType::Pl1).unwrap(), 28_000);
        assert_eq!(facade.last_set_limits().get(&PowerControlType::Pl1), Some(&watts(15.0)));
        let state = platform.domain(0, 0).unwrap().power.unwrap();
        assert_eq!(state.time_windows_ms.get(&PowerControlType::Pl1), Some(&28_000));
    }

    #[test]
    fn test_average_power_fallbacks() {
        let (_, with_status) =
            simulated_facade(DomainInterfaces::POWER_CONTROL | DomainInterfaces::POWER_STATUS);
        assert_eq!(with_status.average_power().unwrap(), watts(12.0));

        let (_, without_status) = simulated_facade(DomainInterfaces::POWER_CONTROL);
        assert_eq!(without_status.average_power().unwrap(), watts(25.0));
    }

    #[test]
    fn test_failed_write_keeps_last_set_value() {
        let (platform, facade) = simulated_facade(DomainInterfaces::POWER_CONTROL);
        facade.set_power_limit(PowerControlType::Pl1, watts(20.0)).unwrap();
        platform.fail_request(0, 0, "SetPowerLimit").unwrap();

        assert!(facade.set_power_limit(PowerControlType::Pl1, watts(10.0)).is_err());
        assert_eq!(facade.power_limit(PowerControlType::Pl1).unwrap(), watts(20.0));
    }

    #[test]
    fn test_capabilities_fetched_once() {
        let mut layer = MockActions::new();
        layer
            .expect_submit_request()
            .withf(|_, _, r| *r == ActionRequest::GetPowerControlCapabilities)
            .times(1)
            .returning(|_, _, _| {
                Ok(ActionResponse::PowerCapabilities(
                    [(
                        PowerControlType::Pl1,
                        PowerControlDynamicCaps::new(watts(5.0), watts(25.0), watts(1.0)),
                    )]
                    .into_iter()
                    .collect(),
                ))
            });

        let facade = PowerControlFacade::new(
            DomainActions::new(Arc::new(layer), 0, 0),
            properties(DomainInterfaces::POWER_CONTROL),
        );
        for _ in 0..3 {
            assert_eq!(
                facade.capability(PowerControlType::Pl1).unwrap().max_power_limit,
                watts(25.0)
            );
        }
    }

    #[test]
    fn test_set_capability_invalidates_cache() {
        let (platform, facade) = simulated_facade(DomainInterfaces::POWER_CONTROL);
        assert_eq!(facade.capability(PowerControlType::Pl1).unwrap().max_power_limit, watts(25.0));

        facade
            .set_capability(
                PowerControlType::Pl1,
                PowerControlDynamicCaps::new(watts(5.0), watts(15.0), watts(1.0)),
            )
            .unwrap();
        assert_eq!(facade.capability(PowerControlType::Pl1).unwrap().max_power_limit, watts(15.0));

        facade.lock_capabilities().unwrap();
        assert!(platform.domain(0, 0).unwrap().power.unwrap().capabilities_locked);
        assert!(facade
            .set_capability(
                PowerControlType::Pl1,
                PowerControlDynamicCaps::new(watts(5.0), watts(10.0), watts(1.0)),
            )
            .is_err());
    }
}
