//! Performance index arbitration across the P-state and T-state sub-ranges
//!
//! P-states and T-states share one index space, P-states first. The knob keeps
//! a single request table for both and hands out a view per sub-range; a view
//! only steps while the indexes on both sides of the step belong to its owner.
//! Stepping into or within the T-states is further gated on utilization.

use dptf_protocol::{Percentage, PerformanceControlType, TargetIndex};
use tracing::{debug, info};

use super::{Bounds, ControlKnob, RequestTable, Restriction};
use crate::constants::policy::{DEFAULT_TSTATE_UTILIZATION_THRESHOLD, UNKNOWN_UTILIZATION};
use crate::error::Result;
use crate::facade::PerformanceControlFacade;
use crate::status::KnobStatus;

#[derive(Debug)]
pub struct PerformanceControlKnob {
    facade: PerformanceControlFacade,
    requests: RequestTable<u32>,
    pstates_limited: bool,
    tstates_limited: bool,
    tstate_utilization_threshold: Percentage,
}

impl PerformanceControlKnob {
    pub fn new(facade: PerformanceControlFacade) -> Self {
        Self::with_requests(facade, RequestTable::new())
    }

    pub fn with_requests(facade: PerformanceControlFacade, requests: RequestTable<u32>) -> Self {
        Self {
            facade,
            requests,
            pstates_limited: false,
            tstates_limited: false,
            tstate_utilization_threshold: Percentage::from_fraction(DEFAULT_TSTATE_UTILIZATION_THRESHOLD),
        }
    }

    pub fn facade(&self) -> &PerformanceControlFacade {
        &self.facade
    }

    /// View that steps through P-states only
    pub fn pstates(&mut self) -> PerformanceKnobView<'_> {
        PerformanceKnobView {
            knob: self,
            owner: PerformanceControlType::PerformanceState,
        }
    }

    /// View that steps through T-states only
    pub fn tstates(&mut self) -> PerformanceKnobView<'_> {
        PerformanceKnobView {
            knob: self,
            owner: PerformanceControlType::ThrottleState,
        }
    }

    pub fn tstate_utilization_threshold(&self) -> Percentage {
        self.tstate_utilization_threshold
    }

    pub fn set_tstate_utilization_threshold(&mut self, threshold: Percentage) {
        debug!(
            "Participant {} domain {}: T-state utilization threshold now {}",
            self.facade.participant(),
            self.facade.domain(),
            threshold
        );
        self.tstate_utilization_threshold = threshold;
    }

    pub fn has_been_limited(&self, owner: PerformanceControlType) -> bool {
        match owner {
            PerformanceControlType::PerformanceState => self.pstates_limited,
            PerformanceControlType::ThrottleState => self.tstates_limited,
        }
    }

    fn set_limited(&mut self, owner: PerformanceControlType, limited: bool) {
        match owner {
            PerformanceControlType::PerformanceState => self.pstates_limited = limited,
            PerformanceControlType::ThrottleState => self.tstates_limited = limited,
        }
    }

    fn bounds(&self) -> Result<Bounds<u32>> {
        let caps = self.facade.dynamic_caps()?;
        Ok(Bounds::new(
            caps.current_upper_limit_index,
            caps.current_lower_limit_index,
            Restriction::HigherIsStricter,
        ))
    }

    pub fn target_request(&self, target: TargetIndex) -> Result<u32> {
        match self.requests.get(target) {
            Some(index) => Ok(index),
            None => Ok(self.bounds()?.unrestricted),
        }
    }

    fn utilization_allows_throttling(&self) -> bool {
        let utilization = self
            .facade
            .utilization()
            .map(|u| u.fraction())
            .unwrap_or_else(|e| {
                debug!("Performance: utilization unavailable ({}), assuming busy", e);
                UNKNOWN_UTILIZATION
            });
        utilization >= self.tstate_utilization_threshold.fraction()
    }

    pub fn check_can_limit(&self, owner: PerformanceControlType, target: TargetIndex) -> Result<bool> {
        self.facade.require_supported()?;
        let bounds = self.bounds()?;
        let current = self.target_request(target)?.max(bounds.unrestricted);
        if current >= bounds.most_restrictive {
            return Ok(false);
        }

        let controls = self.facade.controls()?;
        let (Some(here), Some(next)) = (controls.control_type(current), controls.control_type(current + 1))
        else {
            return Ok(false);
        };

        use PerformanceControlType::{PerformanceState as P, ThrottleState as T};
        let allowed = match (here, next) {
            (P, P) => owner == P,
            (P, T) | (T, T) => owner == T && self.utilization_allows_throttling(),
            (T, P) => owner == T,
        };
        Ok(allowed)
    }

    pub fn check_can_unlimit(&self, owner: PerformanceControlType, target: TargetIndex) -> Result<bool> {
        self.facade.require_supported()?;
        let bounds = self.bounds()?;
        let current = self.target_request(target)?.min(bounds.most_restrictive);
        if current <= bounds.unrestricted {
            return Ok(false);
        }
        let controls = self.facade.controls()?;
        Ok(controls.control_type(current - 1) == Some(owner))
    }

    fn limit(&mut self, owner: PerformanceControlType, target: TargetIndex) -> Result<()> {
        self.facade.require_supported()?;
        let bounds = self.bounds()?;
        let request = self.target_request(target)?;
        let current = request.max(bounds.unrestricted);
        let next = current.saturating_add(1).min(bounds.most_restrictive);

        self.requests.set(target, next);
        self.set_limited(owner, true);
        debug!("{}: target {} requests index {} (was {})", owner, target, next, request);
        Ok(())
    }

    fn unlimit(&mut self, owner: PerformanceControlType, target: TargetIndex) -> Result<()> {
        self.facade.require_supported()?;
        if !self.has_been_limited(owner) {
            debug!("{}: ignoring unlimit from target {}, never limited", owner, target);
            return Ok(());
        }
        let bounds = self.bounds()?;
        let request = self.target_request(target)?;
        let current = request.min(bounds.most_restrictive);
        let next = current.saturating_sub(1).max(bounds.unrestricted);

        self.requests.set(target, next);
        debug!("{}: target {} requests index {} (was {})", owner, target, next, request);
        Ok(())
    }

    /// Program the highest requested index. Both views commit through here.
    pub fn commit_setting(&mut self) -> Result<bool> {
        if !self.facade.supports_performance_controls() {
            return Ok(false);
        }
        let next = self.bounds()?.resolve(&self.requests);
        let current = self.facade.status()?.current_control_set_index;
        if current == next {
            return Ok(false);
        }

        self.facade.set_control(next)?;
        info!(
            "Participant {} domain {}: performance index changed from {} to {}",
            self.facade.participant(),
            self.facade.domain(),
            current,
            next
        );
        Ok(true)
    }

    pub fn clear_request_for_target(&mut self, target: TargetIndex) {
        self.requests.clear(target);
    }

    pub fn clear_all_requests(&mut self) {
        self.requests.clear_all();
        self.pstates_limited = false;
        self.tstates_limited = false;
    }

    pub fn adjust_requests_to_capabilities(&mut self) -> Result<()> {
        let bounds = self.bounds()?;
        self.requests.snap_all(|index| bounds.snap(index));
        Ok(())
    }

    pub fn status_for(&self, owner: PerformanceControlType) -> KnobStatus<u32> {
        let mut status = KnobStatus::new(view_name(owner), self.facade.supports_performance_controls());
        status.has_been_limited = self.has_been_limited(owner);
        status.requests = self.requests.to_map();
        status.bounds = self.bounds().ok();
        status.programmed = self.facade.last_issued().map(|s| s.current_control_set_index);
        status
    }
}

fn view_name(owner: PerformanceControlType) -> &'static str {
    match owner {
        PerformanceControlType::PerformanceState => "P-States",
        PerformanceControlType::ThrottleState => "T-States",
    }
}

/// One sub-range of a [`PerformanceControlKnob`], usable as a [`ControlKnob`]
#[derive(Debug)]
pub struct PerformanceKnobView<'a> {
    knob: &'a mut PerformanceControlKnob,
    owner: PerformanceControlType,
}

impl PerformanceKnobView<'_> {
    pub fn owner(&self) -> PerformanceControlType {
        self.owner
    }
}

impl ControlKnob for PerformanceKnobView<'_> {
    type Value = u32;

    fn name(&self) -> &'static str {
        view_name(self.owner)
    }

    fn check_can_limit(&self, target: TargetIndex) -> Result<bool> {
        self.knob.check_can_limit(self.owner, target)
    }

    fn check_can_unlimit(&self, target: TargetIndex) -> Result<bool> {
        self.knob.check_can_unlimit(self.owner, target)
    }

    fn limit(&mut self, target: TargetIndex) -> Result<()> {
        self.knob.limit(self.owner, target)
    }

    fn unlimit(&mut self, target: TargetIndex) -> Result<()> {
        self.knob.unlimit(self.owner, target)
    }

    fn commit_setting(&mut self) -> Result<bool> {
        self.knob.commit_setting()
    }

    fn target_request(&self, target: TargetIndex) -> Result<u32> {
        self.knob.target_request(target)
    }

    fn clear_request_for_target(&mut self, target: TargetIndex) {
        self.knob.clear_request_for_target(target);
    }

    fn clear_all_requests(&mut self) {
        self.knob.clear_all_requests();
    }

    fn adjust_requests_to_capabilities(&mut self) -> Result<()> {
        self.knob.adjust_requests_to_capabilities()
    }

    fn has_been_limited(&self) -> bool {
        self.knob.has_been_limited(self.owner)
    }

    fn status(&self) -> KnobStatus<u32> {
        self.knob.status_for(self.owner)
    }
}
