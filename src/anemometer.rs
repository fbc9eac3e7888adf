//! Anemometer facade: lifecycle plus wind statistics
//!
//! Wraps a [`Sampler`] and a [`WindSpeedCalculator`] behind one handle. The
//! sampler keeps the counter history; queries slice that history, aggregate
//! it and hand `(pulses, seconds)` to the calculator, which owns the physical
//! formula and the output unit.

use alloc::vec::Vec;

use log::debug;

use crate::async_i2c_bus::BusClaim;
use crate::clock::Clock;
use crate::config::AnemometerConfig;
use crate::error::{ConfigError, Error};
use crate::sampling::{ReadFailedCallback, Sampler, SamplerState};
use crate::sensors::CounterDevice;
use crate::storage::{
    CounterSample, HistoryQuery, PulseCount, SortOrder, TimeRange, accumulate, peak_rate,
};
use crate::wind::{WindSpeed, WindSpeedCalculator};

pub struct Anemometer<D, F, C> {
    sampler: Sampler<D, C>,
    calculator: F,
    /// Held for the anemometer's lifetime so no second instance drives the chip.
    claim: BusClaim,
}

impl<D, F, C> Anemometer<D, F, C>
where
    D: CounterDevice,
    F: WindSpeedCalculator,
    C: Clock,
{
    /// Validate `config` and claim the device's bus address.
    ///
    /// Fails with [`ConfigError::AddressInUse`] if another anemometer in this
    /// process already drives the same address on the same bus.
    pub fn new(
        device: D,
        calculator: F,
        config: AnemometerConfig,
        clock: C,
    ) -> Result<Self, Error> {
        config.validate()?;
        let claim = BusClaim::acquire(config.bus, config.address)?;
        Ok(Self {
            sampler: Sampler::new(device, &config, clock),
            calculator,
            claim,
        })
    }

    /// Attach a callback notified of every failed counter read.
    pub fn with_read_failed(mut self, callback: ReadFailedCallback) -> Self {
        self.sampler = self.sampler.with_read_failed(callback);
        self
    }

    pub async fn open(&self) -> Result<(), Error> {
        debug!(
            "Opening anemometer 0x{:02x} on bus {}",
            self.claim.address(),
            self.claim.bus()
        );
        self.sampler.open().await
    }

    pub async fn close(&self) -> Result<(), Error> {
        self.sampler.close().await
    }

    /// The periodic sampling task; see [`Sampler::run`].
    pub async fn run(&self) {
        self.sampler.run().await
    }

    /// Whether the sampling task is running.
    pub fn is_ready(&self) -> bool {
        self.sampler.is_running()
    }

    pub fn state(&self) -> SamplerState {
        self.sampler.state()
    }

    pub fn sampler(&self) -> &Sampler<D, C> {
        &self.sampler
    }

    /// Pulses and elapsed seconds over the last `recent_secs` seconds.
    pub fn data(&self, recent_secs: u64) -> Result<PulseCount, Error> {
        self.pulses(&HistoryQuery::recent(recent_secs))
    }

    /// Average speed over the window selected by `query`.
    pub fn average_wind_speed(&self, query: &HistoryQuery) -> Result<WindSpeed, Error> {
        let count = self.pulses(query)?;
        Ok(self
            .calculator
            .calculate(count.pulses, count.duration_secs as f64))
    }

    /// Fastest step between consecutive samples in the window selected by `query`.
    pub fn peak_wind_gust(&self, query: &HistoryQuery) -> Result<WindSpeed, Error> {
        let samples = self.window(query)?;
        let peak = peak_rate(&samples);
        Ok(self
            .calculator
            .calculate(peak.step, peak.time_span as f64))
    }

    /// Raw samples selected by `query`.
    pub fn history_data(&self, query: &HistoryQuery) -> Vec<CounterSample> {
        self.sampler.history(query)
    }

    fn pulses(&self, query: &HistoryQuery) -> Result<PulseCount, Error> {
        let samples = self.window(query)?;
        Ok(accumulate(&samples))
    }

    /// Ascending samples for an aggregate, rejecting windows the history
    /// cannot fully cover.
    fn window(&self, query: &HistoryQuery) -> Result<Vec<CounterSample>, Error> {
        let max = self.sampler.expiration_secs();
        match query.range {
            TimeRange::All => {}
            TimeRange::Recent(secs) => {
                if secs == 0 || secs > max {
                    return Err(ConfigError::WindowOutOfRange {
                        requested: secs,
                        max,
                    }
                    .into());
                }
            }
            TimeRange::Between { start, end } => {
                if start > end {
                    return Err(ConfigError::InvalidRange { start, end }.into());
                }
                if end - start > max {
                    return Err(ConfigError::WindowOutOfRange {
                        requested: end - start,
                        max,
                    }
                    .into());
                }
            }
        }

        let query = HistoryQuery {
            order: Some(SortOrder::Ascending),
            ..*query
        };
        Ok(self.sampler.history(&query))
    }
}
