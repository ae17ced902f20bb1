//! Display brightness facade

use dptf_protocol::{DisplayControlDynamicCaps, DisplayControlStatus};
use tracing::debug;

use super::{ensure_supported, ControlFacade, ControlKind};
use crate::cache::CachedProperty;
use crate::data::DomainProperties;
use crate::error::Result;
use crate::services::DomainActions;

#[derive(Debug)]
pub struct DisplayControlFacade {
    actions: DomainActions,
    properties: DomainProperties,
    capabilities: CachedProperty<DisplayControlDynamicCaps>,
    last_issued: CachedProperty<DisplayControlStatus>,
}

impl DisplayControlFacade {
    pub fn new(actions: DomainActions, properties: DomainProperties) -> Self {
        Self {
            actions,
            properties,
            capabilities: CachedProperty::new(),
            last_issued: CachedProperty::new(),
        }
    }

    pub fn supports_display_controls(&self) -> bool {
        self.properties.implements_display_control()
    }

    /// `NotSupported` unless the domain implements this control
    pub fn require_supported(&self) -> Result<()> {
        ensure_supported(self.supports_display_controls(), ControlKind::Display, &self.actions)
    }

    pub fn capabilities(&self) -> Result<DisplayControlDynamicCaps> {
        self.require_supported()?;
        self.capabilities
            .get_or_fetch(|| self.actions.display_capabilities())
    }

    pub fn status(&self) -> Result<DisplayControlStatus> {
        self.require_supported()?;
        self.last_issued.get_or_fetch(|| self.actions.display_status())
    }

    /// Value this process last programmed, without touching the hardware
    pub fn last_issued(&self) -> Option<DisplayControlStatus> {
        self.last_issued.peek()
    }

    /// Brightness index as the hardware currently reports it
    pub fn live_status(&self) -> Result<DisplayControlStatus> {
        self.require_supported()?;
        let status = self.actions.display_status()?;
        self.last_issued.set(status);
        Ok(status)
    }

    pub fn set_control(&self, index: u32) -> Result<()> {
        self.require_supported()?;
        self.actions.set_display_control(index)?;
        self.last_issued.set(DisplayControlStatus {
            brightness_limit_index: index,
        });
        debug!(
            "Participant {} domain {}: brightness limit set to index {}",
            self.actions.participant(),
            self.actions.domain(),
            index
        );
        Ok(())
    }
}

impl ControlFacade for DisplayControlFacade {
    fn kind(&self) -> ControlKind {
        ControlKind::Display
    }

    fn is_supported(&self) -> bool {
        self.supports_display_controls()
    }

    /// Brightness belongs to the user until a policy limits it, so this only
    /// pulls an already programmed limit back inside the capabilities.
    fn initialize_controls_if_needed(&self) -> Result<()> {
        self.require_supported()?;
        let Some(status) = self.last_issued.peek() else {
            return Ok(());
        };
        let caps = self.capabilities()?;
        let snapped = status
            .brightness_limit_index
            .max(caps.current_upper_limit)
            .min(caps.current_lower_limit);
        if snapped != status.brightness_limit_index {
            self.set_control(snapped)?;
        }
        Ok(())
    }

    fn set_controls_to_max(&self) -> Result<()> {
        let caps = self.capabilities()?;
        self.set_control(caps.current_upper_limit)
    }

    fn refresh_capabilities(&self) -> Result<()> {
        self.capabilities.invalidate();
        self.capabilities().map(|_| ())
    }

    fn invalidate_capabilities(&self) {
        self.capabilities.invalidate();
    }
}
