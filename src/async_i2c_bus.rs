//! Shared async I2C bus and per-address ownership
//!
//! A counter chip sits on a bus that other peripherals share. Every device
//! handle locks the bus for the duration of one transaction, so transactions
//! from different handles never interleave. On top of that, [`BusClaim`]
//! records which `(bus, address)` pairs are in use by this process, so a second
//! anemometer for the same chip fails at construction instead of corrupting
//! the first one's counter.

use alloc::vec::Vec;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use log::debug;

use crate::error::ConfigError;

/// Pairs currently claimed by a live [`BusClaim`].
static CLAIMED: BlockingMutex<CriticalSectionRawMutex, RefCell<Vec<(u8, u8)>>> =
    BlockingMutex::new(RefCell::new(Vec::new()));

/// Exclusive, process-wide ownership of one device address on one bus.
///
/// Released when dropped.
#[derive(Debug)]
pub struct BusClaim {
    bus: u8,
    address: u8,
}

impl BusClaim {
    /// Claim `address` on `bus`, failing if another owner holds it.
    pub fn acquire(bus: u8, address: u8) -> Result<Self, ConfigError> {
        CLAIMED.lock(|claimed| {
            let mut claimed = claimed.borrow_mut();
            if claimed.contains(&(bus, address)) {
                return Err(ConfigError::AddressInUse { bus, address });
            }
            claimed.push((bus, address));
            debug!("Claimed device 0x{:02x} on bus {}", address, bus);
            Ok(Self { bus, address })
        })
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn address(&self) -> u8 {
        self.address
    }
}

impl Drop for BusClaim {
    fn drop(&mut self) {
        CLAIMED.lock(|claimed| {
            claimed
                .borrow_mut()
                .retain(|&pair| pair != (self.bus, self.address));
        });
        debug!("Released device 0x{:02x} on bus {}", self.address, self.bus);
    }
}

/// An I2C peripheral behind an async mutex, tagged with a bus id.
pub struct SharedI2cBus<T> {
    id: u8,
    pub(crate) bus: Mutex<CriticalSectionRawMutex, T>,
}

impl<T> SharedI2cBus<T> {
    pub const fn new(id: u8, bus: T) -> Self {
        Self {
            id,
            bus: Mutex::new(bus),
        }
    }

    pub const fn id(&self) -> u8 {
        self.id
    }

    /// Hand out a device handle for this bus.
    pub const fn device(&self) -> AsyncI2cDevice<'_, T> {
        AsyncI2cDevice::new(self)
    }
}

/// One user's handle onto a [`SharedI2cBus`].
///
/// Each method locks the bus for exactly one transaction, yielding to the
/// executor while another handle holds it.
pub struct AsyncI2cDevice<'a, T> {
    bus: &'a SharedI2cBus<T>,
}

impl<'a, T> AsyncI2cDevice<'a, T> {
    #[inline]
    pub const fn new(bus: &'a SharedI2cBus<T>) -> Self {
        Self { bus }
    }

    pub const fn bus_id(&self) -> u8 {
        self.bus.id
    }
}

#[cfg(feature = "sensor-pcf8583")]
mod hal {
    use embedded_hal_async::i2c::{ErrorType, I2c, Operation};

    use super::AsyncI2cDevice;

    impl<T> ErrorType for AsyncI2cDevice<'_, T>
    where
        T: ErrorType,
    {
        type Error = T::Error;
    }

    /// Every operation holds the bus lock for its whole transaction. A counter
    /// read is a register-pointer write followed by a three-byte read, and
    /// another handle slipping in between would move the pointer and return
    /// the wrong digits.
    impl<T> I2c for AsyncI2cDevice<'_, T>
    where
        T: I2c,
    {
        #[inline]
        async fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
            let mut bus = self.bus.bus.lock().await;
            bus.read(address, read).await
        }

        #[inline]
        async fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
            let mut bus = self.bus.bus.lock().await;
            bus.write(address, write).await
        }

        #[inline]
        async fn write_read(
            &mut self,
            address: u8,
            write: &[u8],
            read: &mut [u8],
        ) -> Result<(), Self::Error> {
            let mut bus = self.bus.bus.lock().await;
            bus.write_read(address, write, read).await
        }

        #[inline]
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            let mut bus = self.bus.bus.lock().await;
            bus.transaction(address, operations).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_claim_is_rejected() {
        let first = BusClaim::acquire(200, 0x50).unwrap();
        assert_eq!(
            BusClaim::acquire(200, 0x50).unwrap_err(),
            ConfigError::AddressInUse {
                bus: 200,
                address: 0x50
            }
        );

        // Same address on another bus, or another address on this bus, is fine.
        let other_bus = BusClaim::acquire(201, 0x50).unwrap();
        let other_address = BusClaim::acquire(200, 0x51).unwrap();
        assert_eq!(other_bus.bus(), 201);
        assert_eq!(other_address.address(), 0x51);
        drop(first);
    }

    #[test]
    fn test_claim_is_released_on_drop() {
        let claim = BusClaim::acquire(202, 0x50).unwrap();
        drop(claim);
        assert!(BusClaim::acquire(202, 0x50).is_ok());
    }
}
