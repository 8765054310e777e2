//! CC1101 transceiver control.
//!
//! Owns the chip's lifecycle (reset, identity probe, RF profile programming)
//! and the conversions between engineering units and register encodings: the
//! 26 MHz-referenced frequency word and the offset-binary RSSI value.

use log::{debug, trace, warn};

use crate::constants::*;
use crate::error::RadianError;
use crate::radio::bus::RegisterBus;
use crate::radio::hal::{Hal, HalError};

/// Crystal reference in MHz; the frequency word is in units of fosc / 2^16.
const XTAL_MHZ: f64 = 26.0;

/// RSSI offset for the 433 MHz band at 38.4 kBaud, per the datasheet.
const RSSI_OFFSET_DBM: i16 = 74;

/// MARCSTATE polls after an SRX strobe before giving up on RX confirmation.
const RX_ENTRY_POLLS: usize = 40;
/// Delay between RX entry polls, in microseconds.
const RX_ENTRY_POLL_US: u32 = 250;

/// 2-FSK RF profile for the RADIAN uplink: 38.4 kBaud, 0x0055 sync, no
/// packet automation, IDLE after both RX and TX.
const RF_PROFILE: &[(u8, u8)] = &[
    (IOCFG2, 0x0D),
    (IOCFG0, 0x06),
    (FIFOTHR, 0x47),
    (SYNC1, 0x55),
    (SYNC0, 0x00),
    (PKTCTRL1, 0x00),
    (PKTCTRL0, 0x00),
    (FSCTRL1, 0x08),
    (MDMCFG4, 0xF6),
    (MDMCFG3, 0x83),
    (MDMCFG2, 0x02),
    (MDMCFG1, 0x00),
    (MDMCFG0, 0x00),
    (DEVIATN, 0x15),
    (MCSM1, 0x00),
    (MCSM0, 0x18),
    (FOCCFG, 0x1D),
    (BSCFG, 0x1C),
    (AGCCTRL2, 0xC7),
    (AGCCTRL1, 0x00),
    (AGCCTRL0, 0xB2),
    (WORCTRL, 0xFB),
    (FREND1, 0xB6),
    (FSCAL3, 0xE9),
    (FSCAL2, 0x2A),
    (FSCAL1, 0x00),
    (FSCAL0, 0x1F),
    (TEST2, 0x81),
    (TEST1, 0x35),
    (TEST0, 0x09),
];

/// Output power table: ~0 dBm in slot 0, remaining slots off.
const PA_TABLE: [u8; 8] = [0x60, 0, 0, 0, 0, 0, 0, 0];

/// Snapshot of chip identity and state for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct ChipStatus {
    pub partnum: u8,
    pub version: u8,
    pub marcstate: u8,
    pub frequency_mhz: f64,
    pub rssi_dbm: i16,
    pub lqi: u8,
    pub rx_bytes: u8,
}

/// Convert a carrier frequency in MHz to the 24-bit FREQ2..FREQ0 word,
/// rounding to the nearest step (~397 Hz).
pub fn mhz_to_freq_word(mhz: f64) -> u32 {
    (mhz * 65536.0 / XTAL_MHZ).round() as u32
}

/// Inverse of [`mhz_to_freq_word`].
pub fn freq_word_to_mhz(word: u32) -> f64 {
    word as f64 * XTAL_MHZ / 65536.0
}

/// Convert the raw RSSI register value (offset-binary, half-dB steps) to dBm.
pub fn rssi_to_dbm(raw: u8) -> i16 {
    if raw >= 128 {
        (raw as i16 - 256) / 2 - RSSI_OFFSET_DBM
    } else {
        raw as i16 / 2 - RSSI_OFFSET_DBM
    }
}

/// A CC1101 behind a [`RegisterBus`].
pub struct Cc1101<H: Hal> {
    bus: RegisterBus<H>,
}

impl<H: Hal> Cc1101<H> {
    pub fn new(hal: H) -> Self {
        Self {
            bus: RegisterBus::new(hal),
        }
    }

    /// Reset the chip, wait out the crystal start-up and flush both FIFOs.
    pub fn reset(&mut self) -> Result<(), RadianError> {
        self.bus.strobe(SRES)?;
        self.bus.hal_mut().delay_us(2000);
        self.bus.strobe(SFTX)?;
        self.bus.strobe(SFRX)?;
        Ok(())
    }

    /// Verify the chip identity registers answer like a CC1101.
    ///
    /// A floating or shorted bus reads back 0x00 or 0xFF everywhere, which is
    /// what this guards against; any sane silicon revision is accepted. Up to
    /// three attempts, with a reset between them.
    pub fn probe(&mut self) -> Result<(u8, u8), RadianError> {
        let mut last = (0u8, 0u8);
        for attempt in 0..3 {
            if attempt > 0 {
                self.reset()?;
            }
            let partnum = self.bus.read_register(PARTNUM_ADDR)?;
            let version = self.bus.read_register(VERSION_ADDR)?;
            let bus_dead = (partnum == 0xFF && version == 0xFF)
                || (partnum == 0x00 && version == 0x00);
            if !bus_dead {
                debug!(
                    "CC1101 detected: partnum={:#04x} version={:#04x}",
                    partnum, version
                );
                return Ok((partnum, version));
            }
            last = (partnum, version);
        }
        warn!(
            "CC1101 not detected: partnum={:#04x} version={:#04x}",
            last.0, last.1
        );
        Err(RadianError::ChipNotDetected {
            part: last.0,
            version: last.1,
        })
    }

    /// Program the full RF profile, output power and carrier frequency.
    pub fn configure(&mut self, frequency_mhz: f64) -> Result<(), RadianError> {
        self.bus.strobe(SIDLE)?;
        for &(addr, value) in RF_PROFILE {
            self.bus.write_register(addr, value)?;
        }
        self.bus.write_burst(PATABLE_ADDR, &PA_TABLE)?;
        self.set_frequency(frequency_mhz)?;
        Ok(())
    }

    /// Retune the synthesizer without touching the rest of the profile.
    pub fn set_frequency(&mut self, mhz: f64) -> Result<(), RadianError> {
        let word = mhz_to_freq_word(mhz);
        trace!("tuning to {:.4} MHz (word {:#08x})", mhz, word);
        self.bus.write_register(FREQ2, (word >> 16) as u8)?;
        self.bus.write_register(FREQ1, (word >> 8) as u8)?;
        self.bus.write_register(FREQ0, word as u8)?;
        Ok(())
    }

    /// Carrier currently programmed into the synthesizer.
    pub fn frequency(&mut self) -> Result<f64, RadianError> {
        let hi = self.bus.read_register(FREQ2)? as u32;
        let mid = self.bus.read_register(FREQ1)? as u32;
        let lo = self.bus.read_register(FREQ0)? as u32;
        Ok(freq_word_to_mhz(hi << 16 | mid << 8 | lo))
    }

    /// Strobe into RX and wait (bounded) until the state machine confirms.
    ///
    /// The wait is a short fixed-iteration poll, about 10 ms worst case, so
    /// a chip that never reaches RX cannot stall a driver tick. RX entry
    /// takes under a millisecond once the synthesizer is calibrated, and a
    /// timeout here is not fatal because the caller's own sync-wait will
    /// catch a chip that never made it.
    pub fn enter_receive(&mut self) -> Result<(), RadianError> {
        self.bus.strobe(SIDLE)?;
        self.bus.strobe(SRX)?;
        for _ in 0..RX_ENTRY_POLLS {
            if marcstate_is_rx(self.marcstate()?) {
                return Ok(());
            }
            self.bus.hal_mut().delay_us(RX_ENTRY_POLL_US);
        }
        warn!("RX entry timed out, MARCSTATE never reached an RX state");
        Ok(())
    }

    pub fn marcstate(&mut self) -> Result<u8, RadianError> {
        Ok(self.bus.read_register(MARCSTATE_ADDR)? & MARCSTATE_MASK)
    }

    pub fn rx_bytes(&mut self) -> Result<u8, RadianError> {
        Ok(self.bus.read_register(RXBYTES_ADDR)? & FIFO_BYTES_MASK)
    }

    pub fn tx_bytes(&mut self) -> Result<u8, RadianError> {
        Ok(self.bus.read_register(TXBYTES_ADDR)? & FIFO_BYTES_MASK)
    }

    pub fn read_rssi_raw(&mut self) -> Result<u8, RadianError> {
        Ok(self.bus.read_register(RSSI_ADDR)?)
    }

    pub fn read_lqi(&mut self) -> Result<u8, RadianError> {
        Ok(self.bus.read_register(LQI_ADDR)?)
    }

    /// Level of the GDO0 sync/data-ready line.
    pub fn data_ready(&mut self) -> Result<bool, HalError> {
        self.bus.hal_mut().data_ready()
    }

    pub fn write_register(&mut self, addr: u8, value: u8) -> Result<(), RadianError> {
        Ok(self.bus.write_register(addr, value)?)
    }

    pub fn read_register(&mut self, addr: u8) -> Result<u8, RadianError> {
        Ok(self.bus.read_register(addr)?)
    }

    pub fn write_fifo(&mut self, data: &[u8]) -> Result<(), RadianError> {
        Ok(self.bus.write_burst(FIFO_ADDR, data)?)
    }

    pub fn read_fifo(&mut self, buf: &mut [u8]) -> Result<(), RadianError> {
        Ok(self.bus.read_burst(FIFO_ADDR, buf)?)
    }

    pub fn strobe(&mut self, strobe: u8) -> Result<(), RadianError> {
        Ok(self.bus.strobe(strobe)?)
    }

    /// Identity and state snapshot for the status CLI.
    pub fn status(&mut self) -> Result<ChipStatus, RadianError> {
        Ok(ChipStatus {
            partnum: self.bus.read_register(PARTNUM_ADDR)?,
            version: self.bus.read_register(VERSION_ADDR)?,
            marcstate: self.marcstate()?,
            frequency_mhz: self.frequency()?,
            rssi_dbm: rssi_to_dbm(self.read_rssi_raw()?),
            lqi: self.read_lqi()?,
            rx_bytes: self.rx_bytes()?,
        })
    }
}
