//! Performance state facade (P-states followed by T-states in one index space)

use std::cell::Cell;

use dptf_protocol::{
    Percentage, PerformanceControlDynamicCaps, PerformanceControlSet, PerformanceControlStatus,
};
use tracing::{debug, info};

use super::{ensure_supported, ControlFacade, ControlKind};
use crate::cache::CachedProperty;
use crate::data::DomainProperties;
use crate::error::{DptfError, Result};
use crate::services::DomainActions;

#[derive(Debug)]
pub struct PerformanceControlFacade {
    actions: DomainActions,
    properties: DomainProperties,
    controls: CachedProperty<PerformanceControlSet>,
    capabilities: CachedProperty<PerformanceControlDynamicCaps>,
    last_issued: CachedProperty<PerformanceControlStatus>,
    controls_initialized: Cell<bool>,
}

impl PerformanceControlFacade {
    pub fn new(actions: DomainActions, properties: DomainProperties) -> Self {
        Self {
            actions,
            properties,
            controls: CachedProperty::new(),
            capabilities: CachedProperty::new(),
            last_issued: CachedProperty::new(),
            controls_initialized: Cell::new(false),
        }
    }

    pub fn supports_performance_controls(&self) -> bool {
        self.properties.implements_performance_control()
    }

    pub fn supports_utilization(&self) -> bool {
        self.properties.implements_utilization()
    }

    /// `NotSupported` unless the domain implements this control
    pub fn require_supported(&self) -> Result<()> {
        ensure_supported(
            self.supports_performance_controls(),
            ControlKind::Performance,
            &self.actions,
        )
    }

    pub fn participant(&self) -> u32 {
        self.actions.participant()
    }

    pub fn domain(&self) -> u32 {
        self.actions.domain()
    }

    pub fn controls(&self) -> Result<PerformanceControlSet> {
        self.require_supported()?;
        self.controls.get_or_fetch(|| self.actions.performance_control_set())
    }

    pub fn dynamic_caps(&self) -> Result<PerformanceControlDynamicCaps> {
        self.require_supported()?;
        self.capabilities
            .get_or_fetch(|| self.actions.performance_dynamic_caps())
    }

    /// Last index this process programmed, or the hardware index if none
    pub fn status(&self) -> Result<PerformanceControlStatus> {
        self.require_supported()?;
        self.last_issued.get_or_fetch(|| self.actions.performance_status())
    }

    /// Value this process last programmed, without touching the hardware
    pub fn last_issued(&self) -> Option<PerformanceControlStatus> {
        self.last_issued.peek()
    }

    pub fn live_status(&self) -> Result<PerformanceControlStatus> {
        self.require_supported()?;
        let status = self.actions.performance_status()?;
        self.last_issued.set(status);
        Ok(status)
    }

    pub fn set_control(&self, index: u32) -> Result<()> {
        self.require_supported()?;
        let controls = self.controls()?;
        if controls.get(index).is_none() {
            return Err(DptfError::invalid_request(format!(
                "performance index {} is outside a control set of {} entries",
                index,
                controls.len()
            )));
        }

        self.actions.set_performance_control(index)?;
        self.last_issued.set(PerformanceControlStatus {
            current_control_set_index: index,
        });
        debug!(
            "Participant {} domain {}: performance control set to index {}",
            self.participant(),
            self.domain(),
            index
        );
        Ok(())
    }

    /// Drop the cached control set along with the capabilities
    pub fn refresh_controls(&self) {
        self.controls.invalidate();
        self.capabilities.invalidate();
    }

    pub fn utilization(&self) -> Result<Percentage> {
        ensure_supported(self.supports_utilization(), ControlKind::Performance, &self.actions)?;
        self.actions.utilization()
    }

    /// Move the last programmed index back inside the current caps
    fn set_value_within_capabilities(&self) -> Result<()> {
        let caps = self.dynamic_caps()?;
        let current = self.status()?.current_control_set_index;
        let snapped = current
            .max(caps.current_upper_limit_index)
            .min(caps.current_lower_limit_index);
        if snapped != current {
            info!(
                "Participant {} domain {}: performance index {} outside [{}, {}], now {}",
                self.participant(),
                self.domain(),
                current,
                caps.current_upper_limit_index,
                caps.current_lower_limit_index,
                snapped
            );
            self.set_control(snapped)?;
        }
        Ok(())
    }
}

impl ControlFacade for PerformanceControlFacade {
    fn kind(&self) -> ControlKind {
        ControlKind::Performance
    }

    fn is_supported(&self) -> bool {
        self.supports_performance_controls()
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
        self.set_control(caps.current_upper_limit_index)
    }

    fn refresh_capabilities(&self) -> Result<()> {
        self.refresh_controls();
        self.dynamic_caps().map(|_| ())
    }

    fn invalidate_capabilities(&self) {
        self.capabilities.invalidate();
    }
}
