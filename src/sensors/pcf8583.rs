use embedded_hal_async::i2c::I2c;
use log::{debug, error, info};

use super::bcd;
use super::{COUNTER_MAX, CounterDevice, CounterMode, DeviceError};

/// 7-bit address with the A0 pin tied low.
pub const PCF8583_ADDRESS_LOW: u8 = 0x50;
/// 7-bit address with the A0 pin tied high.
pub const PCF8583_ADDRESS_HIGH: u8 = 0x51;

const REG_CONTROL: u8 = 0x00;
/// First of three counter registers, least significant digits first.
const REG_COUNTER: u8 = 0x01;

const CONTROL_STOP_COUNTING: u8 = 0x80;
const CONTROL_MODE_MASK: u8 = 0x30;

/// Control, counter and timer registers zeroed on reset, starting at `REG_CONTROL`.
const DEFAULT_REGISTERS: [u8; 9] = [0x00; 9];

impl CounterMode {
    const fn control_bits(self) -> u8 {
        match self {
            Self::Clock32Khz => 0x00,
            Self::Clock50Hz => 0x10,
            Self::EventCounter => 0x20,
        }
    }
}

/// Driver for a PCF8583 clock/calendar chip used as a six-digit event counter.
pub struct Pcf8583<I> {
    i2c: I,
    address: u8,
    open: bool,
}

impl<I: I2c> Pcf8583<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            i2c,
            address,
            open: false,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give the bus handle back.
    pub fn release(self) -> I {
        self.i2c
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.open {
            Ok(())
        } else {
            Err(DeviceError::NotOpen)
        }
    }

    async fn read_control(&mut self) -> Result<u8, DeviceError> {
        let mut control = [0u8; 1];
        self.i2c
            .write_read(self.address, &[REG_CONTROL], &mut control)
            .await
            .map_err(|e| {
                error!("PCF8583 control read failed: {:?}", e);
                DeviceError::Bus {
                    operation: "read control register",
                }
            })?;
        Ok(control[0])
    }

    async fn write_control(&mut self, control: u8) -> Result<(), DeviceError> {
        self.i2c
            .write(self.address, &[REG_CONTROL, control])
            .await
            .map_err(|e| {
                error!("PCF8583 control write failed: {:?}", e);
                DeviceError::Bus {
                    operation: "write control register",
                }
            })
    }
}

/// Split a counter value into three BCD bytes, least significant first.
fn encode_count(value: u32) -> Result<[u8; 3], DeviceError> {
    if value > COUNTER_MAX {
        return Err(DeviceError::InvalidValue(value));
    }
    Ok([
        bcd::encode((value % 100) as u8)?,
        bcd::encode((value / 100 % 100) as u8)?,
        bcd::encode((value / 10_000) as u8)?,
    ])
}

fn decode_count(registers: [u8; 3]) -> Result<u32, DeviceError> {
    let low = bcd::decode(registers[0])? as u32;
    let mid = bcd::decode(registers[1])? as u32;
    let high = bcd::decode(registers[2])? as u32;
    Ok(high * 10_000 + mid * 100 + low)
}

impl<I: I2c> CounterDevice for Pcf8583<I> {
    async fn open(&mut self) -> Result<(), DeviceError> {
        if self.open {
            return Err(DeviceError::AlreadyOpen);
        }
        // Probe the chip so a missing device fails here rather than on first read.
        let control = self.read_control().await?;
        self.open = true;
        info!(
            "PCF8583 at 0x{:02x} opened (control 0x{:02x})",
            self.address, control
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        if !self.open {
            return Err(DeviceError::AlreadyClosed);
        }
        self.open = false;
        info!("PCF8583 at 0x{:02x} closed", self.address);
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        let mut image = [0u8; DEFAULT_REGISTERS.len() + 1];
        image[0] = REG_CONTROL;
        image[1..].copy_from_slice(&DEFAULT_REGISTERS);
        self.i2c.write(self.address, &image).await.map_err(|e| {
            error!("PCF8583 reset failed: {:?}", e);
            DeviceError::Bus {
                operation: "write default registers",
            }
        })
    }

    async fn set_mode(&mut self, mode: CounterMode) -> Result<(), DeviceError> {
        self.ensure_open()?;
        let control = self.read_control().await?;
        let control = (control & !CONTROL_MODE_MASK) | mode.control_bits();
        debug!("PCF8583 mode {:?} (control 0x{:02x})", mode, control);
        self.write_control(control).await
    }

    async fn set_count(&mut self, value: u32) -> Result<(), DeviceError> {
        let digits = encode_count(value)?;
        self.ensure_open()?;

        // Hold the counter while its three registers are rewritten.
        let control = self.read_control().await?;
        self.write_control(control | CONTROL_STOP_COUNTING).await?;

        let write = self
            .i2c
            .write(
                self.address,
                &[REG_COUNTER, digits[0], digits[1], digits[2]],
            )
            .await
            .map_err(|e| {
                error!("PCF8583 counter write failed: {:?}", e);
                DeviceError::Bus {
                    operation: "write counter registers",
                }
            });

        // Resume counting even if the counter write failed.
        self.write_control(control & !CONTROL_STOP_COUNTING).await?;
        write
    }

    async fn get_count(&mut self) -> Result<u32, DeviceError> {
        self.ensure_open()?;
        let mut registers = [0u8; 3];
        self.i2c
            .write_read(self.address, &[REG_COUNTER], &mut registers)
            .await
            .map_err(|e| {
                error!("PCF8583 counter read failed: {:?}", e);
                DeviceError::Bus {
                    operation: "read counter registers",
                }
            })?;
        decode_count(registers)
    }
}
