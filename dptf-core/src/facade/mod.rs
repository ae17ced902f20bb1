//! Control facades
//!
//! One facade wraps one control type on one (participant, domain). It answers
//! whether the domain implements the control, caches capability bounds and
//! remembers the last value this process programmed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DptfError, Result};
use crate::services::DomainActions;

mod cores;
mod display;
mod performance;
mod power;
mod temperature;

pub use cores::CoreControlFacade;
pub use display::DisplayControlFacade;
pub use performance::PerformanceControlFacade;
pub use power::PowerControlFacade;
pub use temperature::TemperatureControlFacade;

/// Control categories managed per domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Power,
    Performance,
    Core,
    Display,
    Temperature,
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlKind::Power => "Power",
            ControlKind::Performance => "Performance",
            ControlKind::Core => "Core",
            ControlKind::Display => "Display",
            ControlKind::Temperature => "Temperature",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle operations shared by every control facade
pub trait ControlFacade {
    fn kind(&self) -> ControlKind;

    /// Whether the domain advertises this control. Never fails.
    fn is_supported(&self) -> bool;

    /// First call programs the least limiting value; later calls pull the
    /// last programmed value back inside the current capabilities.
    fn initialize_controls_if_needed(&self) -> Result<()>;

    /// Program the least limiting legal value
    fn set_controls_to_max(&self) -> Result<()>;

    /// Drop cached capabilities and fetch them again immediately
    fn refresh_capabilities(&self) -> Result<()>;

    /// Drop cached capabilities; the next access fetches them again
    fn invalidate_capabilities(&self);
}

/// Fail with `NotSupported` unless `supported` holds
pub(crate) fn ensure_supported(supported: bool, kind: ControlKind, actions: &DomainActions) -> Result<()> {
    if supported {
        Ok(())
    } else {
        Err(DptfError::not_supported(
            kind.to_string(),
            actions.participant(),
            actions.domain(),
        ))
    }
}
