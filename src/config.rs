use alloc::vec::Vec;

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sensors::COUNTER_MAX;

/// Default 7-bit address of a PCF8583 with its A0 pin tied low.
pub const DEFAULT_ADDRESS: u8 = 0x50;

pub const DEFAULT_READ_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_RETRIES: u8 = 3;

/// Counter value above which the device is proactively zeroed.
pub const DEFAULT_ROLLOVER_THRESHOLD: u32 = 900_000;

pub const DEFAULT_EXPIRATION_SECS: u64 = 600;
pub const DEFAULT_MAX_ELEMENTS: usize = 700;

/// Sampling and retention settings for one anemometer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AnemometerConfig {
    /// Identifier of the bus the device sits on.
    pub bus: u8,
    /// 7-bit device address.
    pub address: u8,
    pub read_interval_ms: u64,
    /// Read attempts per tick before the device is reset.
    pub retries: u8,
    /// Deadline for a single counter read. `None` waits indefinitely.
    pub read_timeout_ms: Option<u64>,
    pub rollover_threshold: u32,
    pub history: HistoryConfig,
}

/// Retention policy of the history window.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Samples older than this many seconds are dropped on clean.
    pub expiration_secs: u64,
    /// Upper bound on retained samples; `0` disables the bound.
    pub max_elements: usize,
}

impl Default for AnemometerConfig {
    fn default() -> Self {
        Self {
            bus: 0,
            address: DEFAULT_ADDRESS,
            read_interval_ms: DEFAULT_READ_INTERVAL_MS,
            retries: DEFAULT_RETRIES,
            read_timeout_ms: None,
            rollover_threshold: DEFAULT_ROLLOVER_THRESHOLD,
            history: HistoryConfig::default(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            expiration_secs: DEFAULT_EXPIRATION_SECS,
            max_elements: DEFAULT_MAX_ELEMENTS,
        }
    }
}

impl AnemometerConfig {
    /// Check the settings the sampler relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if self.read_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.rollover_threshold >= COUNTER_MAX {
            return Err(ConfigError::ThresholdOutOfRange(self.rollover_threshold));
        }
        Ok(())
    }

    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(self.read_interval_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Decode a configuration stored as a postcard blob (e.g. in flash).
    pub fn from_postcard(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|e| {
            log::error!("Failed to decode anemometer config: {:?}", e);
            ConfigError::Decode
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_postcard(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|e| {
            log::error!("Failed to encode anemometer config: {:?}", e);
            ConfigError::Encode
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnemometerConfig::default();
        assert_eq!(config.address, 0x50);
        assert_eq!(config.read_interval_ms, 1000);
        assert_eq!(config.retries, 3);
        assert_eq!(config.rollover_threshold, 900_000);
        assert_eq!(config.history.expiration_secs, 600);
        assert_eq!(config.history.max_elements, 700);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let config = AnemometerConfig {
            retries: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroRetries));

        let config = AnemometerConfig {
            read_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));

        let config = AnemometerConfig {
            rollover_threshold: 999_999,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ThresholdOutOfRange(999_999))
        );
    }

    #[test]
    fn test_postcard_blob_is_validated_on_load() {
        let stored = AnemometerConfig {
            address: 0x51,
            read_timeout_ms: Some(250),
            ..Default::default()
        };
        let bytes = stored.to_postcard().unwrap();
        assert_eq!(AnemometerConfig::from_postcard(&bytes), Ok(stored));

        let invalid = AnemometerConfig {
            retries: 0,
            ..Default::default()
        };
        let bytes = invalid.to_postcard().unwrap();
        assert_eq!(
            AnemometerConfig::from_postcard(&bytes),
            Err(ConfigError::ZeroRetries)
        );

        assert_eq!(
            AnemometerConfig::from_postcard(&[0xff]),
            Err(ConfigError::Decode)
        );
    }

    #[test]
    fn test_blob_errors_name_their_direction() {
        assert_eq!(ConfigError::Decode.to_string(), "Malformed configuration blob");
        assert_eq!(ConfigError::Encode.to_string(), "Configuration could not be encoded");
        assert_ne!(ConfigError::Encode, ConfigError::Decode);
    }
}
