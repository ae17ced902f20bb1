/*
 * This file is part of dptf.
 *
 * Copyright (C) 2025 dptf contributors
 *
 * dptf is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * dptf is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with dptf. If not, see <https://www.gnu.org/licenses/>.
 */

//! Limit and unlimit runs over a simulated platform

use std::sync::Arc;

use dptf_core::simulator::SimulatedPlatform;
use dptf_core::{ParticipantProxy, ParticipantStatus};
use dptf_error::Result;
use dptf_protocol::{ParticipantIndex, Percentage, TargetIndex};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::PolicySettings;
use crate::platform::PlatformDescription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Limit,
    Unlimit,
}

/// Outcome of one step offered to the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: u32,
    pub direction: Direction,
    /// Participant that took the step; `None` once every participant is exhausted
    pub absorbed_by: Option<ParticipantIndex>,
    pub committed: bool,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub target: TargetIndex,
    pub steps: Vec<StepReport>,
    pub participants: Vec<ParticipantStatus>,
}

#[derive(Debug)]
pub struct Session {
    platform: Arc<SimulatedPlatform>,
    participants: Vec<ParticipantProxy>,
    settings: PolicySettings,
}

impl Session {
    pub fn new(description: &PlatformDescription, settings: PolicySettings) -> Result<Self> {
        description.validate()?;
        settings.validate()?;
        let (platform, participants) = description.build();
        Ok(Self {
            platform,
            participants,
            settings,
        })
    }

    pub fn platform(&self) -> &Arc<SimulatedPlatform> {
        &self.platform
    }

    pub fn participants(&self) -> &[ParticipantProxy] {
        &self.participants
    }

    pub fn participants_mut(&mut self) -> &mut [ParticipantProxy] {
        &mut self.participants
    }

    /// Bring every control within its capabilities and apply the T-state
    /// utilization threshold
    pub fn initialize(&mut self) -> Result<()> {
        let threshold = Percentage::from_fraction(self.settings.tstate_utilization_threshold);
        for participant in &mut self.participants {
            participant.initialize_controls();
            for index in participant.domain_indexes() {
                participant.domain_mut(index)?.set_tstate_utilization_threshold(threshold);
            }
        }
        info!("Session initialized, T-state utilization threshold {}", threshold);
        Ok(())
    }

    /// Offer `steps` limit steps for `target`, participants in order
    pub fn limit(&mut self, target: TargetIndex, steps: u32) -> Result<Vec<StepReport>> {
        self.run(Direction::Limit, target, steps)
    }

    /// Offer `steps` unlimit steps for `target`, participants in reverse order
    pub fn unlimit(&mut self, target: TargetIndex, steps: u32) -> Result<Vec<StepReport>> {
        self.run(Direction::Unlimit, target, steps)
    }

    /// Limit then unlimit by the same number of steps
    pub fn cycle(&mut self, target: TargetIndex, steps: u32) -> Result<Vec<StepReport>> {
        let mut reports = self.limit(target, steps)?;
        reports.extend(self.unlimit(target, steps)?);
        Ok(reports)
    }

    pub fn commit(&mut self) -> Result<bool> {
        let mut committed = false;
        for participant in &mut self.participants {
            committed |= participant.commit_limits()?;
        }
        Ok(committed)
    }

    pub fn status(&self) -> Vec<ParticipantStatus> {
        self.participants.iter().map(ParticipantProxy::status).collect()
    }

    pub fn report(&self, target: TargetIndex, steps: Vec<StepReport>) -> RunReport {
        RunReport {
            target,
            steps,
            participants: self.status(),
        }
    }

    fn run(&mut self, direction: Direction, target: TargetIndex, steps: u32) -> Result<Vec<StepReport>> {
        let mut reports = Vec::new();
        for step in 1..=steps {
            let absorbed_by = self.offer(direction, target);
            let committed = if self.settings.commit_each_step && absorbed_by.is_some() {
                self.commit()?
            } else {
                false
            };
            debug!("{:?} step {} for target {}: absorbed by {:?}", direction, step, target, absorbed_by);
            reports.push(StepReport {
                step,
                direction,
                absorbed_by,
                committed,
            });
            if absorbed_by.is_none() {
                info!("{:?} exhausted for target {} after {} step(s)", direction, target, step - 1);
                break;
            }
        }

        if !self.settings.commit_each_step {
            let committed = self.commit()?;
            if let Some(last) = reports.last_mut() {
                last.committed = committed;
            }
        }
        Ok(reports)
    }

    fn offer(&mut self, direction: Direction, target: TargetIndex) -> Option<ParticipantIndex> {
        match direction {
            Direction::Limit => self
                .participants
                .iter_mut()
                .find_map(|participant| participant.request_limit(target).then(|| participant.index())),
            Direction::Unlimit => self
                .participants
                .iter_mut()
                .rev()
                .find_map(|participant| participant.request_unlimit(target).then(|| participant.index())),
        }
    }
}
