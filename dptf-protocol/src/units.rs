//! Unit newtypes carried across the action layer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Electrical power in milliwatts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Power(u32);

impl Power {
    pub const ZERO: Power = Power(0);

    pub const fn from_milliwatts(milliwatts: u32) -> Self {
        Self(milliwatts)
    }

    pub fn from_watts(watts: f64) -> Self {
        Self((watts * 1000.0).round().max(0.0) as u32)
    }

    pub const fn milliwatts(self) -> u32 {
        self.0
    }

    pub fn watts(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn saturating_add(self, other: Power) -> Power {
        Power(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Power) -> Power {
        Power(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}W", self.0 / 1000, self.0 % 1000)
    }
}

/// Temperature in millidegrees Celsius
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Temperature(i32);

impl Temperature {
    pub const fn from_millicelsius(millicelsius: i32) -> Self {
        Self(millicelsius)
    }

    pub fn from_celsius(celsius: f64) -> Self {
        Self((celsius * 1000.0).round() as i32)
    }

    pub const fn millicelsius(self) -> i32 {
        self.0
    }

    pub fn celsius(self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°C", self.celsius())
    }
}

/// A fraction in [0.0, 1.0], displayed as a percentage
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(f64);

impl Percentage {
    pub const FULL: Percentage = Percentage(1.0);

    /// Create from a fraction, clamping into [0.0, 1.0]
    pub fn from_fraction(fraction: f64) -> Self {
        if fraction.is_nan() {
            return Self(0.0);
        }
        Self(fraction.clamp(0.0, 1.0))
    }

    pub fn fraction(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0 * 100.0)
    }
}
