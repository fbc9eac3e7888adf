pub mod bcd;
#[cfg(feature = "sensor-pcf8583")]
mod pcf8583;

use thiserror_no_std::Error;

use bcd::ConversionError;

#[cfg(feature = "sensor-pcf8583")]
pub use pcf8583::*;

/// Largest value a six-digit event counter can hold.
pub const COUNTER_MAX: u32 = 999_999;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Device connection is already open")]
    AlreadyOpen,
    #[error("Device connection is already closed")]
    AlreadyClosed,
    #[error("Device connection is not open")]
    NotOpen,
    #[error("Counter value {0} is outside [0, 999999]")]
    InvalidValue(u32),
    #[error("Bus transaction failed during {operation}")]
    Bus { operation: &'static str },
    #[error("Device did not answer in time")]
    Timeout,
    #[error("Malformed register contents: {0}")]
    Conversion(ConversionError),
}

impl From<ConversionError> for DeviceError {
    fn from(value: ConversionError) -> Self {
        Self::Conversion(value)
    }
}

/// Function modes of an RTC-style counter chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMode {
    /// Clock driven by the 32.768 kHz crystal.
    Clock32Khz,
    /// Clock driven by a 50 Hz mains signal.
    Clock50Hz,
    /// Counts edges on the oscillator input.
    EventCounter,
}

/// A device holding a monotonically increasing pulse counter.
///
/// Every call is a bus transaction and may suspend; implementations must
/// fail with [`DeviceError::NotOpen`] once the connection has been closed
/// instead of touching the bus.
pub trait CounterDevice {
    fn open(&mut self) -> impl Future<Output = Result<(), DeviceError>>;

    fn close(&mut self) -> impl Future<Output = Result<(), DeviceError>>;

    /// Restore the device's fixed default register image.
    fn reset(&mut self) -> impl Future<Output = Result<(), DeviceError>>;

    fn set_mode(&mut self, mode: CounterMode) -> impl Future<Output = Result<(), DeviceError>>;

    /// Overwrite the counter. Values above [`COUNTER_MAX`] are rejected.
    fn set_count(&mut self, value: u32) -> impl Future<Output = Result<(), DeviceError>>;

    fn get_count(&mut self) -> impl Future<Output = Result<u32, DeviceError>>;
}
