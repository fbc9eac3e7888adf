//! Crate-wide error types

use thiserror_no_std::Error;

use crate::sensors::DeviceError;
use crate::sensors::bcd::ConversionError;

/// Top-level error returned by the anemometer and sampler APIs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(ConfigError),
    #[error("Device error: {0}")]
    Device(DeviceError),
    #[error("State error: {0}")]
    State(StateError),
    #[error("Conversion error: {0}")]
    Conversion(ConversionError),
}

/// Invalid configuration or query parameters.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Query window of {requested}s is outside (0, {max}]s")]
    WindowOutOfRange { requested: u64, max: u64 },
    #[error("Invalid time range: start {start} is after end {end}")]
    InvalidRange { start: u64, end: u64 },
    #[error("Retry count must be at least 1")]
    ZeroRetries,
    #[error("Read interval must be non-zero")]
    ZeroInterval,
    #[error("Rollover threshold {0} exceeds the counter range")]
    ThresholdOutOfRange(u32),
    #[error("Device 0x{address:02x} on bus {bus} is already claimed")]
    AddressInUse { bus: u8, address: u8 },
    #[error("Malformed configuration blob")]
    Decode,
    #[error("Configuration could not be encoded")]
    Encode,
}

/// Invalid lifecycle transition.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("Anemometer is already open")]
    AlreadyOpen,
    #[error("Anemometer is already closed")]
    AlreadyClosed,
    #[error("Anemometer is opening or closing")]
    Busy,
    #[error("Sampler is not running")]
    NotRunning,
}

impl From<ConfigError> for Error {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value)
    }
}

impl From<DeviceError> for Error {
    fn from(value: DeviceError) -> Self {
        Self::Device(value)
    }
}

impl From<StateError> for Error {
    fn from(value: StateError) -> Self {
        Self::State(value)
    }
}

impl From<ConversionError> for Error {
    fn from(value: ConversionError) -> Self {
        Self::Conversion(value)
    }
}
