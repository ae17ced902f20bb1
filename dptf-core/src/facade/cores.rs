//! Active logical processor facade

use std::cell::Cell;

use dptf_protocol::{
    CoreControlDynamicCaps, CoreControlLpoPreference, CoreControlStaticCaps, CoreControlStatus,
};
use tracing::{debug, info};

use super::{ensure_supported, ControlFacade, ControlKind};
use crate::cache::CachedProperty;
use crate::data::DomainProperties;
use crate::error::Result;
use crate::services::DomainActions;

#[derive(Debug)]
pub struct CoreControlFacade {
    actions: DomainActions,
    properties: DomainProperties,
    static_caps: CachedProperty<CoreControlStaticCaps>,
    dynamic_caps: CachedProperty<CoreControlDynamicCaps>,
    lpo_preference: CachedProperty<CoreControlLpoPreference>,
    last_issued: CachedProperty<CoreControlStatus>,
    controls_initialized: Cell<bool>,
}

impl CoreControlFacade {
    pub fn new(actions: DomainActions, properties: DomainProperties) -> Self {
        Self {
            actions,
            properties,
            static_caps: CachedProperty::new(),
            dynamic_caps: CachedProperty::new(),
            lpo_preference: CachedProperty::new(),
            last_issued: CachedProperty::new(),
            controls_initialized: Cell::new(false),
        }
    }

    pub fn supports_core_controls(&self) -> bool {
        self.properties.implements_core_control()
    }

    /// `NotSupported` unless the domain implements this control
    pub fn require_supported(&self) -> Result<()> {
        ensure_supported(self.supports_core_controls(), ControlKind::Core, &self.actions)
    }

    pub fn static_caps(&self) -> Result<CoreControlStaticCaps> {
        self.require_supported()?;
        self.static_caps.get_or_fetch(|| self.actions.core_static_caps())
    }

    pub fn dynamic_caps(&self) -> Result<CoreControlDynamicCaps> {
        self.require_supported()?;
        self.dynamic_caps.get_or_fetch(|| self.actions.core_dynamic_caps())
    }

    pub fn lpo_preference(&self) -> Result<CoreControlLpoPreference> {
        self.require_supported()?;
        self.lpo_preference
            .get_or_fetch(|| self.actions.core_lpo_preference())
    }

    /// Last core count this process programmed, or the hardware count if none
    pub fn status(&self) -> Result<CoreControlStatus> {
        self.require_supported()?;
        self.last_issued.get_or_fetch(|| self.actions.core_status())
    }

    /// Value this process last programmed, without touching the hardware
    pub fn last_issued(&self) -> Option<CoreControlStatus> {
        self.last_issued.peek()
    }

    pub fn live_status(&self) -> Result<CoreControlStatus> {
        self.require_supported()?;
        let status = self.actions.core_status()?;
        self.last_issued.set(status);
        Ok(status)
    }

    pub fn set_active_cores(&self, count: u32) -> Result<()> {
        self.require_supported()?;
        self.actions.set_active_cores(count)?;
        self.last_issued.set(CoreControlStatus {
            active_logical_processors: count,
        });
        debug!(
            "Participant {} domain {}: active cores set to {}",
            self.actions.participant(),
            self.actions.domain(),
            count
        );
        Ok(())
    }

    fn set_value_within_capabilities(&self) -> Result<()> {
        let caps = self.dynamic_caps()?;
        let current = self.status()?.active_logical_processors;
        let snapped = current.min(caps.max_active_cores).max(caps.min_active_cores);
        if snapped != current {
            info!(
                "Participant {} domain {}: {} active cores outside [{}, {}], now {}",
                self.actions.participant(),
                self.actions.domain(),
                current,
                caps.min_active_cores,
                caps.max_active_cores,
                snapped
            );
            self.set_active_cores(snapped)?;
        }
        Ok(())
    }
}

impl ControlFacade for CoreControlFacade {
    fn kind(&self) -> ControlKind {
        ControlKind::Core
    }

    fn is_supported(&self) -> bool {
        self.supports_core_controls()
    }

    fn initialize_controls_if_needed(&self) -> Result<()> {
        self.require_supported()?;
        if self.controls_initialized.get() {
            return self.set_value_within_capabilities();
        }
        self.set_controls_to_max()?;
        self.controls_initialized.set(true);
        Ok(())
    }

    fn set_controls_to_max(&self) -> Result<()> {
        let caps = self.dynamic_caps()?;
        self.set_active_cores(caps.max_active_cores)
    }

    fn refresh_capabilities(&self) -> Result<()> {
        self.invalidate_capabilities();
        self.dynamic_caps().map(|_| ())
    }

    fn invalidate_capabilities(&self) {
        self.dynamic_caps.invalidate();
        self.lpo_preference.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DomainInterfaces;
    use crate::simulator::{SimulatedCore, SimulatedDomain};
    use crate::test_utils::{domain_actions, properties};

    #[test]
    fn test_set_controls_to_max_onlines_every_allowed_core() {
        let mut core = SimulatedCore::new(8, 2);
        core.active_cores = 4;
        let (platform, actions) = domain_actions(SimulatedDomain::new().with_core(core));
        let facade = CoreControlFacade::new(actions, properties(DomainInterfaces::CORE_CONTROL));

        facade.initialize_controls_if_needed().unwrap();
        assert_eq!(facade.status().unwrap().active_logical_processors, 8);
        assert_eq!(platform.domain(0, 0).unwrap().core.unwrap().active_cores, 8);
    }

    #[test]
    fn test_unsupported_without_interface() {
        let (_, actions) = domain_actions(SimulatedDomain::new().with_core(SimulatedCore::new(8, 2)));
        let facade = CoreControlFacade::new(actions, properties(DomainInterfaces::POWER_CONTROL));
        assert!(!facade.is_supported());
        assert!(facade.initialize_controls_if_needed().unwrap_err().is_not_supported());
    }
}
