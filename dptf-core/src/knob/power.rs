//! PL1 power limit arbitration

use dptf_protocol::{Power, PowerControlType, TargetIndex};
use tracing::{debug, info};

use super::{Bounds, ControlKnob, RequestTable, Restriction};
use crate::error::Result;
use crate::facade::PowerControlFacade;
use crate::status::KnobStatus;

#[derive(Debug)]
pub struct PowerControlKnob {
    facade: PowerControlFacade,
    requests: RequestTable<Power>,
    has_been_limited: bool,
}

impl PowerControlKnob {
    pub fn new(facade: PowerControlFacade) -> Self {
        Self::with_requests(facade, RequestTable::new())
    }

    /// Start from an existing request table. The knob still counts as never
    /// having limited.
    pub fn with_requests(facade: PowerControlFacade, requests: RequestTable<Power>) -> Self {
        Self {
            facade,
            requests,
            has_been_limited: false,
        }
    }

    pub fn facade(&self) -> &PowerControlFacade {
        &self.facade
    }

    fn bounds(&self) -> Result<(Bounds<Power>, Power)> {
        let caps = self.facade.capability(PowerControlType::Pl1)?;
        let bounds = Bounds::new(
            caps.max_power_limit,
            caps.min_power_limit,
            Restriction::LowerIsStricter,
        );
        Ok((bounds, caps.power_step_size))
    }

    /// First step below the unrestricted limit. It is measured from average
    /// power, not from the cap; later steps use the fixed hardware step.
    pub fn calculate_next_lower_power_limit(
        current_power: Power,
        minimum: Power,
        step: Power,
        current_limit: Power,
    ) -> Power {
        if current_power <= minimum || step > current_power {
            return minimum;
        }
        let least = current_limit
            .saturating_sub(step)
            .min(current_power.saturating_sub(step));
        least.max(minimum)
    }
}

impl ControlKnob for PowerControlKnob {
    type Value = Power;

    fn name(&self) -> &'static str {
        "Power"
    }

    fn check_can_limit(&self, target: TargetIndex) -> Result<bool> {
        self.facade.require_supported()?;
        let (bounds, _) = self.bounds()?;
        Ok(bounds.can_tighten(self.target_request(target)?))
    }

    fn check_can_unlimit(&self, target: TargetIndex) -> Result<bool> {
        self.facade.require_supported()?;
        let (bounds, _) = self.bounds()?;
        Ok(bounds.can_relax(self.target_request(target)?))
    }

    fn limit(&mut self, target: TargetIndex) -> Result<()> {
        self.facade.require_supported()?;
        let (bounds, step) = self.bounds()?;
        let request = self.target_request(target)?;

        let next = if request >= bounds.unrestricted {
            let average = self.facade.average_power()?;
            debug!("Power: average power is {}", average);
            Self::calculate_next_lower_power_limit(average, bounds.most_restrictive, step, request)
        } else {
            request.saturating_sub(step).max(bounds.most_restrictive)
        };

        self.requests.set(target, next);
        self.has_been_limited = true;
        debug!("Power: target {} requests PL1 {} (was {})", target, next, request);
        Ok(())
    }

    fn unlimit(&mut self, target: TargetIndex) -> Result<()> {
        self.facade.require_supported()?;
        if !self.has_been_limited {
            debug!("Power: ignoring unlimit from target {}, never limited", target);
            return Ok(());
        }
        let (bounds, step) = self.bounds()?;
        let request = self.target_request(target)?;
        let next = request.saturating_add(step).min(bounds.unrestricted);
        self.requests.set(target, next);
        debug!("Power: target {} requests PL1 {} (was {})", target, next, request);
        Ok(())
    }

    fn commit_setting(&mut self) -> Result<bool> {
        if !self.facade.supports_power_controls() {
            return Ok(false);
        }
        let (bounds, _) = self.bounds()?;
        let lowest = bounds.resolve(&self.requests);
        let current = self.facade.power_limit(PowerControlType::Pl1)?;
        if current == lowest {
            return Ok(false);
        }

        self.facade.set_power_limit(PowerControlType::Pl1, lowest)?;
        info!("Power: PL1 changed from {} to {}", current, lowest);
        Ok(true)
    }

    fn target_request(&self, target: TargetIndex) -> Result<Power> {
        match self.requests.get(target) {
            Some(request) => Ok(request),
            None => Ok(self.bounds()?.0.unrestricted),
        }
    }

    fn clear_request_for_target(&mut self, target: TargetIndex) {
        self.requests.clear(target);
    }

    fn clear_all_requests(&mut self) {
        self.requests.clear_all();
        self.has_been_limited = false;
    }

    fn adjust_requests_to_capabilities(&mut self) -> Result<()> {
        let (bounds, _) = self.bounds()?;
        self.requests.snap_all(|request| bounds.snap(request));
        Ok(())
    }

    fn has_been_limited(&self) -> bool {
        self.has_been_limited
    }

    fn status(&self) -> KnobStatus<Power> {
        let mut status = KnobStatus::new(self.name(), self.facade.supports_power_controls());
        status.has_been_limited = self.has_been_limited;
        status.requests = self.requests.to_map();
        status.bounds = self.bounds().ok().map(|(bounds, _)| bounds);
        status.programmed = self.facade.last_set_limits().get(&PowerControlType::Pl1).copied();
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DomainInterfaces;
    use crate::facade::ControlFacade;
    use crate::simulator::{SimulatedDomain, SimulatedPlatform, SimulatedPower};
    use crate::test_utils::{domain_actions, properties, watts};
    use dptf_protocol::PowerControlDynamicCaps;
    use std::sync::Arc;

    fn knob_with(requests: RequestTable<Power>) -> (Arc<SimulatedPlatform>, PowerControlKnob) {
        let power = SimulatedPower::pl1(watts(5.0), watts(25.0), watts(1.0), watts(12.0));
        let (platform, actions) = domain_actions(SimulatedDomain::new().with_power(power));
        let facade = PowerControlFacade::new(
            actions,
            properties(DomainInterfaces::POWER_CONTROL | DomainInterfaces::POWER_STATUS),
        );
        facade.initialize_controls_if_needed().unwrap();
        (platform, PowerControlKnob::with_requests(facade, requests))
    }

    #[test]
    fn test_first_step_measured_from_average_power() {
        let (_, mut knob) = knob_with(RequestTable::new());

        knob.limit(1).unwrap();
        assert_eq!(knob.target_request(1).unwrap(), watts(11.0));

        knob.limit(1).unwrap();
        assert_eq!(knob.target_request(1).unwrap(), watts(10.0));
    }

    #[test]
    fn test_next_lower_limit_edges() {
        let min = watts(5.0);
        let step = watts(1.0);
        assert_eq!(
            PowerControlKnob::calculate_next_lower_power_limit(watts(4.0), min, step, watts(25.0)),
            min
        );
        assert_eq!(
            PowerControlKnob::calculate_next_lower_power_limit(watts(5.5), min, watts(6.0), watts(25.0)),
            min
        );
        assert_eq!(
            PowerControlKnob::calculate_next_lower_power_limit(watts(30.0), min, step, watts(25.0)),
            watts(24.0)
        );
    }

    #[test]
    fn test_commit_resolves_lowest_request_once() {
        let (platform, mut knob) = knob_with(RequestTable::new());
        knob.limit(1).unwrap();
        knob.limit(1).unwrap();
        knob.limit(2).unwrap();
        platform.clear_writes();

        assert!(knob.commit_setting().unwrap());
        assert_eq!(knob.facade().power_limit(PowerControlType::Pl1).unwrap(), watts(10.0));
        assert!(!knob.commit_setting().unwrap());
        assert_eq!(platform.write_count(0, 0), 1);

        knob.unlimit(1).unwrap();
        assert!(knob.commit_setting().unwrap());
        assert_eq!(knob.facade().power_limit(PowerControlType::Pl1).unwrap(), watts(11.0));
    }

    #[test]
    fn test_no_requests_commits_cap() {
        let (_, mut knob) = knob_with(RequestTable::new());
        knob.limit(3).unwrap();
        knob.commit_setting().unwrap();

        knob.clear_request_for_target(3);
        assert_eq!(knob.target_request(3).unwrap(), watts(25.0));
        assert!(knob.commit_setting().unwrap());
        assert_eq!(knob.facade().power_limit(PowerControlType::Pl1).unwrap(), watts(25.0));
    }

    #[test]
    fn test_unlimit_ignored_until_limited() {
        let seeded: RequestTable<Power> = [(1, watts(10.0))].into_iter().collect();
        let (platform, mut knob) = knob_with(seeded);
        platform.clear_writes();

        knob.unlimit(1).unwrap();
        assert_eq!(knob.target_request(1).unwrap(), watts(10.0));
        assert!(!knob.has_been_limited());
        assert_eq!(platform.write_count(0, 0), 0);
    }

    #[test]
    fn test_requests_resnap_after_capabilities_shrink() {
        let (platform, mut knob) = knob_with(RequestTable::new());
        for _ in 0..4 {
            knob.limit(1).unwrap();
        }
        assert_eq!(knob.target_request(1).unwrap(), watts(8.0));

        platform
            .update_domain(0, 0, |d| {
                d.power.as_mut().unwrap().capabilities.set_capability(
                    PowerControlType::Pl1,
                    PowerControlDynamicCaps::new(watts(12.0), watts(20.0), watts(1.0))
                        .with_time_window_ms(1_000, 56_000),
                );
            })
            .unwrap();
        knob.facade().invalidate_capabilities();

        knob.adjust_requests_to_capabilities().unwrap();
        assert_eq!(knob.target_request(1).unwrap(), watts(12.0));
        knob.commit_setting().unwrap();
        assert_eq!(knob.facade().power_limit(PowerControlType::Pl1).unwrap(), watts(12.0));
    }

    #[test]
    fn test_queries_at_bounds() {
        let (_, mut knob) = knob_with(RequestTable::new());
        assert!(knob.can_limit(1));
        assert!(!knob.can_unlimit(1));

        for _ in 0..10 {
            knob.limit(1).unwrap();
        }
        assert_eq!(knob.target_request(1).unwrap(), watts(5.0));
        assert!(!knob.can_limit(1));
        assert!(knob.can_unlimit(1));
    }

    #[test]
    fn test_unsupported_power_control() {
        let power = SimulatedPower::pl1(watts(5.0), watts(25.0), watts(1.0), watts(12.0));
        let (_, actions) = domain_actions(SimulatedDomain::new().with_power(power));
        let mut knob = PowerControlKnob::new(PowerControlFacade::new(
            actions,
            properties(DomainInterfaces::TEMPERATURE),
        ));

        assert!(knob.check_can_limit(1).unwrap_err().is_not_supported());
        assert!(!knob.can_limit(1));
        assert!(knob.limit(1).unwrap_err().is_not_supported());
        assert!(!knob.commit_setting().unwrap());
    }
}
