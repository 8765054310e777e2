//! Register-level SPI transactions for the CC1101.
//!
//! Every chip access is one chip-select-bracketed transaction: a header byte
//! encoding address and access mode, then the data bytes. Status registers
//! (0x30..=0x3D) share their address space with the command strobes and are
//! only distinguishable by the burst-read access mode, so reads in that range
//! always use it.

use crate::constants::*;
use crate::radio::hal::{Hal, HalError};

/// Settle time after asserting chip select, in microseconds.
const CS_SETTLE_US: u32 = 5;

/// Bound on the post-select wait for the SO line to drop, in iterations of
/// one-microsecond polls. SO stays high until the crystal is stable.
const SO_WAIT_ITERS: u32 = 200;

/// Transaction-oriented view of the chip over a [`Hal`].
pub struct RegisterBus<H: Hal> {
    hal: H,
}

impl<H: Hal> RegisterBus<H> {
    pub fn new(hal: H) -> Self {
        Self { hal }
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    /// Assert chip select and wait for the chip to be ready to clock.
    fn begin(&mut self) -> Result<(), HalError> {
        self.hal.chip_select(true)?;
        self.hal.delay_us(CS_SETTLE_US);
        // Bounded wait; platforms without SO observation fall straight
        // through on the default impl.
        for _ in 0..SO_WAIT_ITERS {
            if !self.hal.so_is_high()? {
                break;
            }
            self.hal.delay_us(1);
        }
        Ok(())
    }

    fn end(&mut self) -> Result<(), HalError> {
        self.hal.chip_select(false)
    }

    /// Write one configuration register.
    pub fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError> {
        self.begin()?;
        let result = self
            .hal
            .spi_transfer(WRITE_SINGLE_BYTE | (addr & 0x3F))
            .and_then(|_| self.hal.spi_transfer(value));
        self.end()?;
        result.map(|_| ())
    }

    /// Read one register. Addresses in the status range use the burst-read
    /// access mode the chip requires for them.
    pub fn read_register(&mut self, addr: u8) -> Result<u8, HalError> {
        let addr = addr & 0x3F;
        let mode = if (STATUS_ADDR_FIRST..=STATUS_ADDR_LAST).contains(&addr) {
            READ_BURST
        } else {
            READ_SINGLE_BYTE
        };
        self.begin()?;
        let result = self
            .hal
            .spi_transfer(mode | addr)
            .and_then(|_| self.hal.spi_transfer(0));
        self.end()?;
        result
    }

    /// Burst-write `data` starting at `addr` (FIFO and PATABLE do not
    /// auto-increment on the chip side).
    pub fn write_burst(&mut self, addr: u8, data: &[u8]) -> Result<(), HalError> {
        self.begin()?;
        let mut result = self.hal.spi_transfer(WRITE_BURST | (addr & 0x3F)).map(|_| ());
        if result.is_ok() {
            for &byte in data {
                result = self.hal.spi_transfer(byte).map(|_| ());
                if result.is_err() {
                    break;
                }
            }
        }
        self.end()?;
        result
    }

    /// Burst-read `buf.len()` bytes starting at `addr`.
    pub fn read_burst(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), HalError> {
        self.begin()?;
        let mut result = self.hal.spi_transfer(READ_BURST | (addr & 0x3F)).map(|_| ());
        if result.is_ok() {
            for slot in buf.iter_mut() {
                match self.hal.spi_transfer(0) {
                    Ok(byte) => *slot = byte,
                    Err(e) => {
                        result = Err(e);
                        break;
                    }
                }
            }
        }
        self.end()?;
        result
    }

    /// Issue a command strobe.
    pub fn strobe(&mut self, strobe: u8) -> Result<(), HalError> {
        self.begin()?;
        let result = self.hal.spi_transfer(strobe & 0x3F).map(|_| ());
        self.end()?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::hal::mock::MockHal;

    #[test]
    fn test_status_register_read_uses_burst_mode() {
        let hal = MockHal::new();
        hal.set_chip_id(0x00, 0x14);
        let mut bus = RegisterBus::new(hal);
        assert_eq!(bus.read_register(VERSION_ADDR).unwrap(), 0x14);
    }

    #[test]
    fn test_write_burst_reaches_fifo() {
        let hal = MockHal::new();
        let mut bus = RegisterBus::new(hal.clone());
        bus.write_burst(FIFO_ADDR, &[1, 2, 3]).unwrap();
        assert_eq!(hal.tx_log(), vec![1, 2, 3]);
    }

    #[test]
    fn test_read_burst_drains_fifo_in_order() {
        let hal = MockHal::new();
        hal.set_reply(vec![9, 8, 7, 6]);
        let mut bus = RegisterBus::new(hal.clone());
        bus.strobe(SRX).unwrap();
        let mut buf = [0u8; 4];
        bus.read_burst(FIFO_ADDR, &mut buf).unwrap();
        assert_eq!(buf, [9, 8, 7, 6]);
    }
}
