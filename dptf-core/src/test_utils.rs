/*
 * Test utilities and mock helpers for the arbitration core
 *
 * Fixtures shared by the facade, knob and proxy test modules: an action-layer
 * mock, simulated domains, and shorthand constructors.
 */

use std::sync::Arc;

use dptf_protocol::{
    ActionRequest, ActionResponse, DomainIndex, ParticipantIndex, Percentage, Power, Temperature,
};
use mockall::mock;

use crate::data::{DomainInterfaces, DomainProperties, DomainType};
use crate::error::Result;
use crate::services::{ActionLayer, DomainActions};
use crate::simulator::{
    SimulatedCore, SimulatedDisplay, SimulatedDomain, SimulatedPerformance, SimulatedPlatform,
    SimulatedPower, SimulatedTemperature,
};

mock! {
    pub Actions {}

    impl ActionLayer for Actions {
        fn submit_request(
            &self,
            participant: ParticipantIndex,
            domain: DomainIndex,
            request: ActionRequest,
        ) -> Result<ActionResponse>;
    }
}

pub fn watts(value: f64) -> Power {
    Power::from_watts(value)
}

/// Simulated platform holding `domain` at participant 0, domain 0
pub fn domain_actions(domain: SimulatedDomain) -> (Arc<SimulatedPlatform>, DomainActions) {
    let platform = Arc::new(SimulatedPlatform::new());
    platform.insert_domain(0, 0, domain);
    let actions = DomainActions::new(platform.clone(), 0, 0);
    (platform, actions)
}

pub fn properties(interfaces: DomainInterfaces) -> DomainProperties {
    DomainProperties::new("TEST", DomainType::Processor, interfaces)
}

/// Interfaces of a processor domain with every control
pub fn cpu_interfaces() -> DomainInterfaces {
    DomainInterfaces::POWER_CONTROL
        | DomainInterfaces::POWER_STATUS
        | DomainInterfaces::PERFORMANCE_CONTROL
        | DomainInterfaces::CORE_CONTROL
        | DomainInterfaces::TEMPERATURE
        | DomainInterfaces::TEMPERATURE_THRESHOLD
        | DomainInterfaces::UTILIZATION
}

/// Processor domain: PL1 5-25 W, four P-states then three T-states, eight
/// cores parkable down to two
pub fn create_mock_cpu_domain() -> SimulatedDomain {
    SimulatedDomain::new()
        .with_power(SimulatedPower::pl1(watts(5.0), watts(25.0), watts(1.0), watts(12.0)))
        .with_performance(SimulatedPerformance::new(4, 3))
        .with_core(SimulatedCore::new(8, 2))
        .with_temperature(SimulatedTemperature::new(Temperature::from_celsius(55.0)))
        .with_utilization(Percentage::from_fraction(0.8))
}

/// Display domain with ten brightness levels, user at `user_index`
pub fn create_mock_display_domain(user_index: u32) -> SimulatedDomain {
    let mut display = SimulatedDisplay::new(10);
    display.current_index = user_index;
    SimulatedDomain::new().with_display(display)
}
