//! Display brightness limit arbitration
//!
//! Brightness is owned by the user until a commit first lowers it. The index
//! in effect at that moment becomes a floor: unlimit steps never go brighter,
//! and reaching it again hands brightness back to the user.

use std::cell::RefCell;

use dptf_protocol::TargetIndex;
use tracing::{debug, info};

use super::{Bounds, ControlKnob, RequestTable, Restriction};
use crate::error::Result;
use crate::facade::DisplayControlFacade;
use crate::status::KnobStatus;

#[derive(Debug, Default)]
struct DisplayKnobState {
    requests: RequestTable<u32>,
    has_been_limited: bool,
    /// Brightness index in effect before the first committed limit
    initial_index: u32,
}

#[derive(Debug)]
pub struct DisplayControlKnob {
    facade: DisplayControlFacade,
    state: RefCell<DisplayKnobState>,
}

impl DisplayControlKnob {
    pub fn new(facade: DisplayControlFacade) -> Self {
        Self::with_requests(facade, RequestTable::new())
    }

    pub fn with_requests(facade: DisplayControlFacade, requests: RequestTable<u32>) -> Self {
        Self {
            facade,
            state: RefCell::new(DisplayKnobState {
                requests,
                ..Default::default()
            }),
        }
    }

    pub fn facade(&self) -> &DisplayControlFacade {
        &self.facade
    }

    /// Index the user had before the first committed limit, if limited
    pub fn initial_index(&self) -> Option<u32> {
        let state = self.state.borrow();
        state.has_been_limited.then_some(state.initial_index)
    }

    fn bounds(&self, state: &DisplayKnobState) -> Result<Bounds<u32>> {
        let caps = self.facade.capabilities()?;
        let mut upper = caps.current_upper_limit;
        if state.has_been_limited {
            upper = upper.max(state.initial_index);
        }
        Ok(Bounds::new(upper, caps.current_lower_limit, Restriction::HigherIsStricter))
    }

    fn request_in(&self, state: &DisplayKnobState, target: TargetIndex) -> Result<u32> {
        match state.requests.get(target) {
            Some(index) => Ok(index),
            None => Ok(self.facade.capabilities()?.current_upper_limit),
        }
    }

    fn next_index(&self, state: &DisplayKnobState, target: TargetIndex) -> Result<u32> {
        let bounds = self.bounds(state)?;
        if state.has_been_limited {
            let request = self.request_in(state, target)?;
            return Ok(bounds.snap(request.saturating_add(1)));
        }

        // Start from where the user has brightness now, or from an uncommitted
        // request that is already dimmer
        let actual = self.facade.live_status()?.brightness_limit_index;
        if let Some(request) = state.requests.get(target) {
            if request >= actual {
                return Ok(bounds.snap(request.saturating_add(1)));
            }
        }
        let snapped = bounds.snap(actual);
        Ok(if actual < snapped {
            snapped
        } else if actual > snapped {
            actual
        } else {
            actual.saturating_add(1)
        })
    }
}

impl ControlKnob for DisplayControlKnob {
    type Value = u32;

    fn name(&self) -> &'static str {
        "Display"
    }

    fn check_can_limit(&self, target: TargetIndex) -> Result<bool> {
        self.facade.require_supported()?;
        let lower = self.facade.capabilities()?.current_lower_limit;
        let state = self.state.borrow();
        Ok(self.request_in(&state, target)? < lower)
    }

    /// Once a target relaxes back to the user's index the knob forgets it
    /// ever limited and drops that target's request.
    fn check_can_unlimit(&self, target: TargetIndex) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        if !self.facade.supports_display_controls() || !state.has_been_limited {
            state.requests.clear(target);
            return Ok(false);
        }
        let floor = self.bounds(&state)?.unrestricted;
        if self.request_in(&state, target)? > floor {
            return Ok(true);
        }
        debug!("Display: target {} back at index {}, releasing brightness", target, floor);
        state.has_been_limited = false;
        state.requests.clear(target);
        Ok(false)
    }

    fn limit(&mut self, target: TargetIndex) -> Result<()> {
        self.facade.require_supported()?;
        let mut state = self.state.borrow_mut();
        let request = self.request_in(&state, target)?;
        let next = self.next_index(&state, target)?;
        state.requests.set(target, next);
        debug!("Display: target {} requests index {} (was {})", target, next, request);
        Ok(())
    }

    fn unlimit(&mut self, target: TargetIndex) -> Result<()> {
        self.facade.require_supported()?;
        if !self.check_can_unlimit(target)? {
            return Ok(());
        }
        let upper = self.facade.capabilities()?.current_upper_limit;
        let mut state = self.state.borrow_mut();
        let request = self.request_in(&state, target)?;
        let next = request.saturating_sub(1).max(upper);
        state.requests.set(target, next);
        debug!("Display: target {} requests index {} (was {})", target, next, request);
        Ok(())
    }

    fn commit_setting(&mut self) -> Result<bool> {
        if !self.facade.supports_display_controls() {
            return Ok(false);
        }
        let mut state = self.state.borrow_mut();
        // Brightness belongs to the user while nothing restricts it
        if state.requests.is_empty() && !state.has_been_limited {
            return Ok(false);
        }
        let next = self.bounds(&state)?.resolve(&state.requests);
        let current = self.facade.status()?.brightness_limit_index;

        if current != next {
            self.facade.set_control(next)?;
            if !state.has_been_limited && next > current {
                state.has_been_limited = true;
                state.initial_index = current;
            }
            info!("Display: brightness limit changed from index {} to {}", current, next);
            return Ok(true);
        }

        if state.has_been_limited && current == state.initial_index {
            state.has_been_limited = false;
        }
        Ok(false)
    }

    fn target_request(&self, target: TargetIndex) -> Result<u32> {
        let state = self.state.borrow();
        self.request_in(&state, target)
    }

    fn clear_request_for_target(&mut self, target: TargetIndex) {
        self.state.borrow_mut().requests.clear(target);
    }

    fn clear_all_requests(&mut self) {
        let mut state = self.state.borrow_mut();
        state.requests.clear_all();
        state.has_been_limited = false;
    }

    fn adjust_requests_to_capabilities(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let bounds = self.bounds(&state)?;
        state.requests.snap_all(|index| bounds.snap(index));
        Ok(())
    }

    fn has_been_limited(&self) -> bool {
        self.state.borrow().has_been_limited
    }

    fn status(&self) -> KnobStatus<u32> {
        let state = self.state.borrow();
        let mut status = KnobStatus::new(self.name(), self.facade.supports_display_controls());
        status.has_been_limited = state.has_been_limited;
        status.requests = state.requests.to_map();
        status.bounds = self.bounds(&state).ok();
        status.programmed = self.facade.last_issued().map(|s| s.brightness_limit_index);
        status
    }
}
