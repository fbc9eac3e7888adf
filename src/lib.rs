//! Wind-speed sampling and aggregation engine
//!
//! This crate polls a pulse-counting device (an RTC-style chip run as an event
//! counter), keeps a bounded, time-windowed history of raw counter readings and
//! derives average wind speed and peak gusts from any sub-window of it.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests).
//!
//! # Bus exclusivity
//!
//! Two [`Anemometer`]s must never drive the same device address on the same
//! bus. Within one process this is enforced by the [`async_i2c_bus::BusClaim`]
//! registry; across independent programs it remains a precondition the
//! deployment has to uphold.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod anemometer;
pub mod async_i2c_bus;
pub mod clock;
pub mod config;
pub mod error;
pub mod sampling;
pub mod sensors;
pub mod storage;
pub mod wind;

#[cfg(test)]
pub(crate) mod test_support;

pub use anemometer::Anemometer;
pub use clock::{Clock, MonotonicClock};
pub use config::{AnemometerConfig, HistoryConfig};
pub use error::{ConfigError, Error, StateError};
pub use sampling::{ReadFailure, Sampler, SamplerState, TickOutcome};
pub use sensors::{CounterDevice, CounterMode, DeviceError};
pub use storage::{CounterSample, HistoryQuery, HistoryWindow, SortOrder, TimeRange};
pub use wind::{CupAnemometer, SpeedUnit, WindSpeed, WindSpeedCalculator, calc_factor};
