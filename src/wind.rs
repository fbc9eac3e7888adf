//! Wind speed values and pulse-to-speed conversion

use core::f64::consts::PI;
use core::fmt::Display;

use serde::{Deserialize, Serialize};

const KMH_PER_MS: f64 = 3.6;
const KMH_PER_KNOT: f64 = 1.852;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedUnit {
    KilometersPerHour,
    MetersPerSecond,
    Knots,
}

impl SpeedUnit {
    pub const fn label(self) -> &'static str {
        match self {
            Self::KilometersPerHour => "km/h",
            Self::MetersPerSecond => "m/s",
            Self::Knots => "kn",
        }
    }

    const fn kmh_per_unit(self) -> f64 {
        match self {
            Self::KilometersPerHour => 1.0,
            Self::MetersPerSecond => KMH_PER_MS,
            Self::Knots => KMH_PER_KNOT,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct WindSpeed {
    pub value: f64,
    pub unit: SpeedUnit,
}

impl WindSpeed {
    pub const fn new(value: f64, unit: SpeedUnit) -> Self {
        Self { value, unit }
    }

    pub const fn kmh(value: f64) -> Self {
        Self::new(value, SpeedUnit::KilometersPerHour)
    }

    /// Express this speed in another unit.
    pub fn to(self, unit: SpeedUnit) -> Self {
        if unit == self.unit {
            return self;
        }
        let kmh = self.value * self.unit.kmh_per_unit();
        Self::new(kmh / unit.kmh_per_unit(), unit)
    }
}

impl Display for WindSpeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2} {}", self.value, self.unit.label())
    }
}

/// Turns a pulse count over a duration into a wind speed.
///
/// Any `Fn(u64, f64) -> WindSpeed` closure is a calculator. Implementations
/// receive `(0, 0.0)` for windows without data and must handle a
/// non-positive duration themselves.
pub trait WindSpeedCalculator {
    fn calculate(&self, pulses: u64, duration_secs: f64) -> WindSpeed;
}

impl<F> WindSpeedCalculator for F
where
    F: Fn(u64, f64) -> WindSpeed,
{
    fn calculate(&self, pulses: u64, duration_secs: f64) -> WindSpeed {
        self(pulses, duration_secs)
    }
}

/// km/h per rotation-per-second for a rotor of `radius_cm`.
///
/// `adjustment` corrects for cup drag; typical values are 1.0..1.3.
pub fn calc_factor(radius_cm: f64, adjustment: f64) -> f64 {
    (2.0 * PI * radius_cm / 100_000.0) * 3600.0 * adjustment
}

/// Cup anemometer whose reed switch closes twice per rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CupAnemometer {
    factor: f64,
}

impl CupAnemometer {
    pub const PULSES_PER_ROTATION: f64 = 2.0;

    /// `factor` as produced by [`calc_factor`].
    pub const fn new(factor: f64) -> Self {
        Self { factor }
    }

    pub const fn factor(&self) -> f64 {
        self.factor
    }
}

impl WindSpeedCalculator for CupAnemometer {
    fn calculate(&self, pulses: u64, duration_secs: f64) -> WindSpeed {
        if duration_secs <= 0.0 {
            return WindSpeed::kmh(0.0);
        }
        let rotations_per_sec = pulses as f64 / Self::PULSES_PER_ROTATION / duration_secs;
        WindSpeed::kmh(rotations_per_sec * self.factor)
    }
}
