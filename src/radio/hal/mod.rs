//! Hardware abstraction for the CC1101 transceiver.
//!
//! The driver talks to the radio through the [`Hal`] trait only: a full-duplex
//! SPI byte exchange, a chip-select line, the GDO0 packet-ready line and a
//! short busy-wait delay. [`mock::MockHal`] provides a register-accurate
//! in-memory chip for tests; the `raspberry-pi` feature enables a real
//! implementation on Pi GPIO/SPI.

pub mod mock;

#[cfg(feature = "raspberry-pi")]
pub mod raspberry_pi;

use thiserror::Error;

/// Errors surfaced by a HAL implementation.
#[derive(Debug, Error)]
pub enum HalError {
    /// SPI transfer failed
    #[error("SPI transfer failed: {0}")]
    Spi(String),

    /// GPIO line could not be read or driven
    #[error("GPIO operation failed: {0}")]
    Gpio(String),

    /// Underlying bus device could not be opened
    #[error("device initialization failed: {0}")]
    Init(String),
}

/// Platform interface to the CC1101.
///
/// Implementations must keep chip select under caller control: the register
/// bus brackets multi-byte transactions with [`Hal::chip_select`] and expects
/// the SPI clock to idle between them.
pub trait Hal {
    /// Exchange one byte on SPI, returning the byte clocked in.
    fn spi_transfer(&mut self, byte: u8) -> Result<u8, HalError>;

    /// Assert (`true`) or release (`false`) the chip-select line.
    fn chip_select(&mut self, asserted: bool) -> Result<(), HalError>;

    /// Level of the GDO0 line, high when the sync word has been seen and
    /// FIFO data is available.
    fn data_ready(&mut self) -> Result<bool, HalError>;

    /// Level of the SO/MISO line while chip select is asserted. The chip
    /// holds SO high until its crystal is stable; platforms that cannot
    /// observe the pin report `false` and rely on the settle delay instead.
    fn so_is_high(&mut self) -> Result<bool, HalError> {
        Ok(false)
    }

    /// Busy-wait for at least `micros` microseconds.
    fn delay_us(&mut self, micros: u32);
}
