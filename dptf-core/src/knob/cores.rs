//! Active logical processor arbitration

use dptf_protocol::TargetIndex;
use tracing::{debug, info};

use super::{Bounds, ControlKnob, RequestTable, Restriction};
use crate::constants::policy::MIN_CORE_STEP;
use crate::error::Result;
use crate::facade::CoreControlFacade;
use crate::status::KnobStatus;

#[derive(Debug)]
pub struct CoreControlKnob {
    facade: CoreControlFacade,
    requests: RequestTable<u32>,
    has_been_limited: bool,
}

impl CoreControlKnob {
    pub fn new(facade: CoreControlFacade) -> Self {
        Self::with_requests(facade, RequestTable::new())
    }

    pub fn with_requests(facade: CoreControlFacade, requests: RequestTable<u32>) -> Self {
        Self {
            facade,
            requests,
            has_been_limited: false,
        }
    }

    pub fn facade(&self) -> &CoreControlFacade {
        &self.facade
    }

    fn bounds(&self) -> Result<Bounds<u32>> {
        let caps = self.facade.dynamic_caps()?;
        Ok(Bounds::new(
            caps.max_active_cores,
            caps.min_active_cores,
            Restriction::LowerIsStricter,
        ))
    }

    /// Cores added or removed per step: the LPO step fraction of all logical
    /// processors, rounded up
    pub fn step_amount(&self) -> Result<u32> {
        let total = self.facade.static_caps()?.total_logical_processors;
        let fraction = self.facade.lpo_preference()?.step_size.fraction();
        let step = (fraction * f64::from(total)).ceil() as u32;
        Ok(step.max(MIN_CORE_STEP))
    }

    /// Whether cores may be parked once performance has been limited to
    /// `performance_index`. Parking waits until the P-state request reaches the
    /// LPO start P-state.
    pub fn check_can_limit_with_performance(&self, target: TargetIndex, performance_index: u32) -> Result<bool> {
        self.facade.require_supported()?;
        let lpo = self.facade.lpo_preference()?;
        if !lpo.lpo_enabled {
            return Ok(false);
        }
        if performance_index < lpo.start_pstate_index {
            return Ok(false);
        }
        Ok(self.bounds()?.can_tighten(self.target_request(target)?))
    }

    pub fn can_limit_with_performance(&self, target: TargetIndex, performance_index: u32) -> bool {
        self.check_can_limit_with_performance(target, performance_index)
            .unwrap_or_else(|e| {
                debug!("Cores cannot limit for target {}: {}", target, e);
                false
            })
    }
}

impl ControlKnob for CoreControlKnob {
    type Value = u32;

    fn name(&self) -> &'static str {
        "Cores"
    }

    fn check_can_limit(&self, target: TargetIndex) -> Result<bool> {
        self.facade.require_supported()?;
        let start = self.facade.lpo_preference()?.start_pstate_index;
        self.check_can_limit_with_performance(target, start)
    }

    fn check_can_unlimit(&self, target: TargetIndex) -> Result<bool> {
        self.facade.require_supported()?;
        if !self.facade.lpo_preference()?.lpo_enabled {
            return Ok(false);
        }
        Ok(self.bounds()?.can_relax(self.target_request(target)?))
    }

    fn limit(&mut self, target: TargetIndex) -> Result<()> {
        self.facade.require_supported()?;
        let bounds = self.bounds()?;
        let step = self.step_amount()?;
        let request = self.target_request(target)?;
        let next = request.saturating_sub(step).max(bounds.most_restrictive);

        self.requests.set(target, next);
        self.has_been_limited = true;
        debug!("Cores: target {} requests {} active (was {})", target, next, request);
        Ok(())
    }

    fn unlimit(&mut self, target: TargetIndex) -> Result<()> {
        self.facade.require_supported()?;
        if !self.has_been_limited {
            debug!("Cores: ignoring unlimit from target {}, never limited", target);
            return Ok(());
        }
        let bounds = self.bounds()?;
        let step = self.step_amount()?;
        let request = self.target_request(target)?;
        let next = request.saturating_add(step).min(bounds.unrestricted);

        self.requests.set(target, next);
        debug!("Cores: target {} requests {} active (was {})", target, next, request);
        Ok(())
    }

    fn commit_setting(&mut self) -> Result<bool> {
        if !self.facade.supports_core_controls() {
            return Ok(false);
        }
        let next = self.bounds()?.resolve(&self.requests);
        let current = self.facade.status()?.active_logical_processors;
        if current == next {
            return Ok(false);
        }

        self.facade.set_active_cores(next)?;
        info!("Cores: active logical processors changed from {} to {}", current, next);
        Ok(true)
    }

    fn target_request(&self, target: TargetIndex) -> Result<u32> {
        match self.requests.get(target) {
            Some(count) => Ok(count),
            None => Ok(self.bounds()?.unrestricted),
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
        let bounds = self.bounds()?;
        self.requests.snap_all(|count| bounds.snap(count));
        Ok(())
    }

    fn has_been_limited(&self) -> bool {
        self.has_been_limited
    }

    fn status(&self) -> KnobStatus<u32> {
        let mut status = KnobStatus::new(self.name(), self.facade.supports_core_controls());
        status.has_been_limited = self.has_been_limited;
        status.requests = self.requests.to_map();
        status.bounds = self.bounds().ok();
        status.programmed = self.facade.last_issued().map(|s| s.active_logical_processors);
        status
    }
}
