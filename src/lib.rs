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

//! dptf - Control-knob arbitration driver
//!
//! This library loads policy settings and JSON platform descriptions, binds
//! participant proxies onto a simulated platform and runs limit/unlimit
//! scenarios against them.

pub mod config;
pub mod logger;
pub mod platform;
pub mod scenario;

pub use config::PolicySettings;
pub use platform::PlatformDescription;
pub use scenario::{Direction, RunReport, Session, StepReport};
