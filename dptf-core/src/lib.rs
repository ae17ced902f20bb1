//! DPTF Core Library
//!
//! Control-knob arbitration for platform thermal and power policies.
//!
//! # Features
//!
//! - **Facades**: per-domain wrappers that cache capabilities and remember the
//!   last value programmed for power, performance, core, display and
//!   temperature controls
//! - **Knobs**: turn many per-target limit requests into one hardware write per
//!   commit, always picking the most restrictive request
//! - **Proxies**: own every facade and knob of a domain or participant, with
//!   per-control failure isolation
//! - **Simulator**: an in-memory action layer for tests and dry runs
//!
//! # Module Structure
//!
//! - `facade/` - Control facades
//! - `knob/` - Arbitration knobs and request tables
//! - `data/` - Domain properties and interfaces
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dptf_core::{DomainActions, DomainInterfaces, DomainProperties, DomainProxy, DomainType};
//! use dptf_core::simulator::{SimulatedDomain, SimulatedPlatform};
//!
//! let platform = Arc::new(SimulatedPlatform::new());
//! platform.insert_domain(0, 0, SimulatedDomain::new());
//!
//! let properties = DomainProperties::new("CPU", DomainType::Processor, DomainInterfaces::POWER_CONTROL);
//! let mut proxy = DomainProxy::new(DomainActions::new(platform, 0, 0), properties);
//! proxy.initialize_controls();
//! proxy.request_limit(1);
//! proxy.commit_limits().unwrap();
//! ```

// Grouped modules
pub mod data;
pub mod facade;
pub mod knob;

// Standalone modules
pub mod cache;
pub mod constants;
pub mod domain;
pub mod error;
pub mod participant;
pub mod services;
pub mod simulator;
pub mod status;

#[cfg(test)]
mod test_utils;

pub use data::{DomainInterfaces, DomainProperties, DomainType};
pub use domain::DomainProxy;
pub use error::{DptfError, Result};
pub use facade::{
    ControlFacade, ControlKind, CoreControlFacade, DisplayControlFacade, PerformanceControlFacade,
    PowerControlFacade, TemperatureControlFacade,
};
pub use knob::{
    Bounds, ControlKnob, CoreControlKnob, DisplayControlKnob, PerformanceControlKnob,
    PerformanceKnobView, PowerControlKnob, RequestTable, Restriction,
};
pub use participant::ParticipantProxy;
pub use services::{ActionLayer, DomainActions};
pub use status::{to_pretty_json, DomainStatus, KnobStatus, ParticipantStatus};
