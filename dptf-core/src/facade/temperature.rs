//! Temperature and notification threshold facade

use dptf_protocol::{Temperature, TemperatureThresholds};

use super::{ensure_supported, ControlKind};
use crate::cache::CachedProperty;
use crate::data::DomainProperties;
use crate::error::Result;
use crate::services::DomainActions;

#[derive(Debug)]
pub struct TemperatureControlFacade {
    actions: DomainActions,
    properties: DomainProperties,
    thresholds: CachedProperty<TemperatureThresholds>,
}

impl TemperatureControlFacade {
    pub fn new(actions: DomainActions, properties: DomainProperties) -> Self {
        Self {
            actions,
            properties,
            thresholds: CachedProperty::new(),
        }
    }

    pub fn supports_temperature(&self) -> bool {
        self.properties.implements_temperature()
    }

    pub fn supports_temperature_thresholds(&self) -> bool {
        self.properties.implements_temperature_threshold()
    }

    pub fn temperature(&self) -> Result<Temperature> {
        ensure_supported(self.supports_temperature(), ControlKind::Temperature, &self.actions)?;
        self.actions.temperature()
    }

    pub fn thresholds(&self) -> Result<TemperatureThresholds> {
        self.require_thresholds()?;
        self.thresholds
            .get_or_fetch(|| self.actions.temperature_thresholds())
    }

    /// Program aux0/aux1; `None` disables that bound. Hysteresis is kept.
    pub fn set_temperature_notification_thresholds(
        &self,
        lower: Option<Temperature>,
        upper: Option<Temperature>,
    ) -> Result<()> {
        self.require_thresholds()?;
        let hysteresis = self.thresholds().map(|t| t.hysteresis).unwrap_or_default();
        let thresholds = TemperatureThresholds {
            aux0: lower,
            aux1: upper,
            hysteresis,
        };
        self.actions.set_temperature_thresholds(thresholds)?;
        self.thresholds.set(thresholds);
        Ok(())
    }

    pub fn invalidate_thresholds(&self) {
        self.thresholds.invalidate();
    }

    fn require_thresholds(&self) -> Result<()> {
        ensure_supported(
            self.supports_temperature_thresholds(),
            ControlKind::Temperature,
            &self.actions,
        )
    }
}
