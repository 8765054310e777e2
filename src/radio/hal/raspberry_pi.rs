//! Raspberry Pi GPIO/SPI backend for the CC1101.
//!
//! Chip select is driven from a plain GPIO rather than the controller's
//! hardware CE line so the register bus can hold it across multi-byte
//! transactions and poll SO during the crystal start-up wait.

use std::thread;
use std::time::Duration;

use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

use crate::radio::hal::{Hal, HalError};

/// CC1101 tolerates up to 6.5 MHz; stay comfortably below it.
const SPI_CLOCK_HZ: u32 = 4_000_000;

/// BCM pin numbers for the radio's control lines.
#[derive(Debug, Clone, Copy)]
pub struct PiPins {
    pub cs: u8,
    pub gdo0: u8,
    /// MISO, observed as a plain input between transactions.
    pub so: u8,
}

impl Default for PiPins {
    fn default() -> Self {
        // Matches the common CC1101 breakout wiring on SPI0.
        Self {
            cs: 8,
            gdo0: 25,
            so: 9,
        }
    }
}

pub struct RaspberryPiHal {
    spi: Spi,
    cs: OutputPin,
    gdo0: InputPin,
    so: InputPin,
}

impl RaspberryPiHal {
    pub fn new(spi_bus: u8, pins: PiPins) -> Result<Self, HalError> {
        let bus = match spi_bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            other => {
                return Err(HalError::Init(format!("unsupported SPI bus {}", other)));
            }
        };
        let spi = Spi::new(bus, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)
            .map_err(|e| HalError::Init(format!("SPI: {}", e)))?;
        let gpio = Gpio::new().map_err(|e| HalError::Init(format!("GPIO: {}", e)))?;
        let mut cs = gpio
            .get(pins.cs)
            .map_err(|e| HalError::Init(format!("CS pin: {}", e)))?
            .into_output();
        cs.set_high();
        let gdo0 = gpio
            .get(pins.gdo0)
            .map_err(|e| HalError::Init(format!("GDO0 pin: {}", e)))?
            .into_input();
        let so = gpio
            .get(pins.so)
            .map_err(|e| HalError::Init(format!("SO pin: {}", e)))?
            .into_input();
        Ok(Self {
            spi,
            cs,
            gdo0,
            so,
        })
    }
}

impl Hal for RaspberryPiHal {
    fn spi_transfer(&mut self, byte: u8) -> Result<u8, HalError> {
        let mut read = [0u8];
        self.spi
            .transfer(&mut read, &[byte])
            .map_err(|e| HalError::Spi(e.to_string()))?;
        Ok(read[0])
    }

    fn chip_select(&mut self, asserted: bool) -> Result<(), HalError> {
        // Active low.
        if asserted {
            self.cs.set_low();
        } else {
            self.cs.set_high();
        }
        Ok(())
    }

    fn data_ready(&mut self) -> Result<bool, HalError> {
        Ok(self.gdo0.is_high())
    }

    fn so_is_high(&mut self) -> Result<bool, HalError> {
        Ok(self.so.is_high())
    }

    fn delay_us(&mut self, micros: u32) {
        thread::sleep(Duration::from_micros(micros as u64));
    }
}
