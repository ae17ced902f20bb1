//! Control knobs
//!
//! A knob arbitrates the requests of many policy targets for one control and
//! commits the single most restrictive value through its facade. Each knob
//! owns its facade and its request table.
//!
//! Queries come in two forms. `check_can_limit` / `check_can_unlimit` return
//! `Err` when the answer is unknown (unsupported control, failed read), while
//! `can_limit` / `can_unlimit` fold every error into `false`.

use std::fmt;

use dptf_protocol::TargetIndex;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::status::KnobStatus;

mod cores;
mod display;
mod performance;
mod power;
mod requests;

pub use cores::CoreControlKnob;
pub use display::DisplayControlKnob;
pub use performance::{PerformanceControlKnob, PerformanceKnobView};
pub use power::PowerControlKnob;
pub use requests::{Bounds, RequestTable, Restriction};

pub trait ControlKnob {
    type Value: Copy + fmt::Debug + fmt::Display + Serialize;

    /// Short control name used in logs and status output
    fn name(&self) -> &'static str;

    fn check_can_limit(&self, target: TargetIndex) -> Result<bool>;

    fn check_can_unlimit(&self, target: TargetIndex) -> Result<bool>;

    fn can_limit(&self, target: TargetIndex) -> bool {
        self.check_can_limit(target).unwrap_or_else(|e| {
            debug!("{} cannot limit for target {}: {}", self.name(), target, e);
            false
        })
    }

    fn can_unlimit(&self, target: TargetIndex) -> bool {
        self.check_can_unlimit(target).unwrap_or_else(|e| {
            debug!("{} cannot unlimit for target {}: {}", self.name(), target, e);
            false
        })
    }

    /// Store a request one step more restrictive than the target's current one
    fn limit(&mut self, target: TargetIndex) -> Result<()>;

    /// Store a request one step less restrictive. No-op unless this knob has
    /// limited before.
    fn unlimit(&mut self, target: TargetIndex) -> Result<()>;

    /// Resolve all requests and program the result if it differs from the
    /// last programmed value. Returns whether a write happened.
    fn commit_setting(&mut self) -> Result<bool>;

    /// The target's stored request, or the unrestricted bound when it has none
    fn target_request(&self, target: TargetIndex) -> Result<Self::Value>;

    fn clear_request_for_target(&mut self, target: TargetIndex);

    fn clear_all_requests(&mut self);

    /// Clamp every stored request into the current capabilities without
    /// writing to hardware
    fn adjust_requests_to_capabilities(&mut self) -> Result<()>;

    fn has_been_limited(&self) -> bool;

    fn status(&self) -> KnobStatus<Self::Value>;
}
