//! Desktop simulator for the anemometer stack
//!
//! Runs the real driver and sampler against a simulated PCF8583 that counts
//! pulses from a synthetic wind profile, then logs the rolling average and
//! gust. Use `RUST_LOG` to pick the verbosity:
//!
//! | Level   | Shows                                       |
//! |---------|---------------------------------------------|
//! | `info`  | Periodic wind reports, open and close       |
//! | `warn`  | Injected read failures and recoveries       |
//! | `debug` | Every sample, history cleanup, bus claims   |
//!
//! ```text
//! RUST_LOG=info cargo run -p anemo-simulator
//! ```

use std::f64::consts::TAU;
use std::time::Instant;

use anemo_rs::async_i2c_bus::SharedI2cBus;
use anemo_rs::sensors::{PCF8583_ADDRESS_LOW, Pcf8583};
use anemo_rs::{
    Anemometer, AnemometerConfig, Clock, CounterDevice, CupAnemometer, HistoryConfig,
    HistoryQuery, MonotonicClock, ReadFailure, SpeedUnit, WindSpeedCalculator, calc_factor,
};
use embassy_futures::block_on;
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Timer};
use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use log::{error, info, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const SIM_BUS_ID: u8 = 0;
const ROTOR_RADIUS_CM: f64 = 9.0;
const ROTOR_ADJUSTMENT: f64 = 1.18;

const READ_INTERVAL_MS: u64 = 250;
const REPORT_INTERVAL: Duration = Duration::from_secs(5);
const REPORT_WINDOW_SECS: u64 = 30;
const REPORT_COUNT: u32 = 24;

/// Every Nth counter read fails, to exercise the retry path.
const FAIL_EVERY_NTH_READ: u32 = 37;

// ---------------------------------------------------------------------------
// Simulated chip
// ---------------------------------------------------------------------------

const REG_CONTROL: usize = 0x00;
const REG_COUNTER: usize = 0x01;
const CONTROL_STOP_COUNTING: u8 = 0x80;
const CONTROL_MODE_MASK: u8 = 0x30;
const CONTROL_EVENT_COUNTER: u8 = 0x20;
const COUNTER_WRAP: u64 = 1_000_000;

/// Wind that gusts on top of a slowly drifting base speed.
struct WindProfile {
    start: Instant,
}

impl WindProfile {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Rotor pulses per second at `at`.
    fn pulse_rate(&self, at: Instant) -> f64 {
        let t = at.duration_since(self.start).as_secs_f64();
        let base = 6.0 + 3.0 * (TAU * t / 90.0).sin();
        let gust = (TAU * t / 13.0).sin().max(0.0).powi(4) * 8.0;
        (base + gust).max(0.0)
    }
}

/// Register-level PCF8583 in event-counter mode.
///
/// The counter advances by the pulses the wind profile produced since the
/// last bus access, and only while event-counter mode is selected and
/// counting is not held.
struct SimulatedPcf8583 {
    registers: [u8; 16],
    wind: WindProfile,
    last_update: Instant,
    /// Fraction of a pulse carried into the next update.
    partial: f64,
    counter_reads: u32,
}

impl SimulatedPcf8583 {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            registers: [0; 16],
            wind: WindProfile::new(),
            last_update: now,
            partial: 0.0,
            counter_reads: 0,
        }
    }

    fn counting(&self) -> bool {
        let control = self.registers[REG_CONTROL];
        control & CONTROL_STOP_COUNTING == 0 && control & CONTROL_MODE_MASK == CONTROL_EVENT_COUNTER
    }

    fn count(&self) -> u64 {
        let digits = &self.registers[REG_COUNTER..REG_COUNTER + 3];
        digits
            .iter()
            .rev()
            .fold(0, |acc, &byte| acc * 100 + (byte >> 4) as u64 * 10 + (byte & 0x0f) as u64)
    }

    fn store_count(&mut self, value: u64) {
        let mut rest = value % COUNTER_WRAP;
        for register in &mut self.registers[REG_COUNTER..REG_COUNTER + 3] {
            let pair = (rest % 100) as u8;
            *register = ((pair / 10) << 4) | (pair % 10);
            rest /= 100;
        }
    }

    fn advance(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        if !self.counting() {
            return;
        }

        self.partial += self.wind.pulse_rate(now) * elapsed;
        let pulses = self.partial.floor();
        self.partial -= pulses;
        if pulses > 0.0 {
            self.store_count(self.count() + pulses as u64);
        }
    }
}

impl ErrorType for SimulatedPcf8583 {
    type Error = ErrorKind;
}

impl I2c for SimulatedPcf8583 {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != PCF8583_ADDRESS_LOW {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        self.advance();

        let mut pointer = 0usize;
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    if let Some((first, rest)) = bytes.split_first() {
                        pointer = *first as usize;
                        for byte in rest {
                            self.registers[pointer % self.registers.len()] = *byte;
                            pointer += 1;
                        }
                    }
                }
                Operation::Read(buffer) => {
                    if pointer == REG_COUNTER {
                        self.counter_reads += 1;
                        if self.counter_reads % FAIL_EVERY_NTH_READ == 0 {
                            return Err(ErrorKind::Other);
                        }
                    }
                    for byte in buffer.iter_mut() {
                        *byte = self.registers[pointer % self.registers.len()];
                        pointer += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

async fn report<D, F, C>(anemometer: &Anemometer<D, F, C>)
where
    D: CounterDevice,
    F: WindSpeedCalculator,
    C: Clock,
{
    let query = HistoryQuery::recent(REPORT_WINDOW_SECS);
    for round in 1..=REPORT_COUNT {
        Timer::after(REPORT_INTERVAL).await;

        let average = match anemometer.average_wind_speed(&query) {
            Ok(speed) => speed,
            Err(e) => {
                error!("Average over {}s failed: {}", REPORT_WINDOW_SECS, e);
                continue;
            }
        };
        let gust = match anemometer.peak_wind_gust(&query) {
            Ok(speed) => speed,
            Err(e) => {
                error!("Gust over {}s failed: {}", REPORT_WINDOW_SECS, e);
                continue;
            }
        };

        info!(
            "[{:>2}/{}] avg {} ({}), gust {} ({}), {} samples held",
            round,
            REPORT_COUNT,
            average,
            average.to(SpeedUnit::MetersPerSecond),
            gust,
            gust.to(SpeedUnit::Knots),
            anemometer.sampler().history_len()
        );
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();

    info!("Starting anemometer simulator");

    let bus = SharedI2cBus::new(SIM_BUS_ID, SimulatedPcf8583::new());
    let counter = Pcf8583::new(bus.device(), PCF8583_ADDRESS_LOW);

    let config = AnemometerConfig {
        bus: bus.id(),
        address: PCF8583_ADDRESS_LOW,
        read_interval_ms: READ_INTERVAL_MS,
        read_timeout_ms: Some(READ_INTERVAL_MS / 2),
        history: HistoryConfig {
            expiration_secs: 120,
            max_elements: 600,
        },
        ..Default::default()
    };

    let calculator = CupAnemometer::new(calc_factor(ROTOR_RADIUS_CM, ROTOR_ADJUSTMENT));
    let anemometer = match Anemometer::new(counter, calculator, config, MonotonicClock) {
        Ok(anemometer) => anemometer,
        Err(e) => {
            error!("Failed to create anemometer: {}", e);
            return;
        }
    };
    let anemometer = anemometer.with_read_failed(Box::new(|failure: &ReadFailure| {
        warn!(
            "Counter read failed (attempt {}/{}): {}",
            failure.attempt, failure.retries, failure.error
        );
        Ok(())
    }));

    block_on(async {
        if let Err(e) = anemometer.open().await {
            error!("Failed to open anemometer: {}", e);
            return;
        }
        info!(
            "Sampling every {}ms, reporting every {}s over the last {}s",
            READ_INTERVAL_MS,
            REPORT_INTERVAL.as_secs(),
            REPORT_WINDOW_SECS
        );

        match select(anemometer.run(), report(&anemometer)).await {
            Either::First(()) => warn!("Sampling task ended unexpectedly"),
            Either::Second(()) => info!("Report rounds complete"),
        }

        if let Err(e) = anemometer.close().await {
            error!("Failed to close anemometer: {}", e);
        }
    });

    info!("Simulator stopped");
}
