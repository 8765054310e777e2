//! In-memory CC1101 for driver tests.
//!
//! [`MockHal`] implements the full SPI register protocol the chip speaks:
//! header byte parsing (single/burst, read/write), command strobes with their
//! state-machine side effects, FIFO access and status register reads. Tests
//! preload a reply byte stream and optionally pin it to a frequency word, then
//! drive the radio driver exactly as production code would.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::constants::*;
use crate::radio::hal::{Hal, HalError};

/// Config register file size (0x00..=0x2E plus room for the strobe range).
const REG_FILE: usize = 0x40;

/// Part number reported by a healthy chip.
const DEFAULT_PARTNUM: u8 = 0x00;
/// Silicon revision reported by a healthy chip.
const DEFAULT_VERSION: u8 = 0x14;

/// MARCSTATE reads observed in TX before the mock retires the state to IDLE.
const TX_READS_UNTIL_IDLE: u8 = 2;

#[derive(Debug, Clone, Copy)]
enum Txn {
    /// Chip select released or header not yet seen.
    Idle,
    /// Header consumed; remaining bytes read from `addr` (auto-advancing in
    /// burst mode except for FIFO and status registers).
    Read { addr: u8, burst: bool, done: bool },
    /// Header consumed; remaining bytes written to `addr`.
    Write { addr: u8, burst: bool, offset: u8 },
}

#[derive(Debug)]
struct MockState {
    regs: [u8; REG_FILE],
    patable: [u8; 8],
    marc: u8,
    rx_fifo: VecDeque<u8>,
    tx_pending: Vec<u8>,
    gdo0: bool,
    cs_asserted: bool,
    txn: Txn,
    partnum: u8,
    version: u8,
    rssi_raw: u8,
    lqi: u8,
    /// Reply stream loaded into the RX FIFO on SRX.
    reply: Vec<u8>,
    /// When set, the reply only appears if FREQ2..FREQ0 hold this word.
    reply_freq_word: Option<u32>,
    /// When set, MARCSTATE reads report this value until the next SFTX.
    forced_marc: Option<u8>,
    tx_reads_left: u8,
    strobe_log: Vec<u8>,
    tx_log: Vec<u8>,
    write_log: Vec<(u8, u8)>,
}

impl MockState {
    fn new() -> Self {
        Self {
            regs: [0u8; REG_FILE],
            patable: [0u8; 8],
            marc: MARCSTATE_IDLE,
            rx_fifo: VecDeque::new(),
            tx_pending: Vec::new(),
            gdo0: false,
            cs_asserted: false,
            txn: Txn::Idle,
            partnum: DEFAULT_PARTNUM,
            version: DEFAULT_VERSION,
            rssi_raw: 0x30,
            lqi: 0x80,
            reply: Vec::new(),
            reply_freq_word: None,
            forced_marc: None,
            tx_reads_left: 0,
            strobe_log: Vec::new(),
            tx_log: Vec::new(),
            write_log: Vec::new(),
        }
    }

    fn freq_word(&self) -> u32 {
        (self.regs[FREQ2 as usize] as u32) << 16
            | (self.regs[FREQ1 as usize] as u32) << 8
            | self.regs[FREQ0 as usize] as u32
    }

    fn apply_strobe(&mut self, strobe: u8) {
        self.strobe_log.push(strobe);
        match strobe {
            SRES => {
                self.regs = [0u8; REG_FILE];
                self.patable = [0u8; 8];
                self.marc = MARCSTATE_IDLE;
                self.rx_fifo.clear();
                self.tx_pending.clear();
                self.gdo0 = false;
            }
            SRX => {
                self.marc = MARCSTATE_RX_FIRST;
                let tuned = self
                    .reply_freq_word
                    .map_or(true, |word| word == self.freq_word());
                if tuned && !self.reply.is_empty() {
                    self.rx_fifo = self.reply.iter().copied().collect();
                    self.gdo0 = true;
                }
            }
            STX => {
                self.marc = MARCSTATE_TX;
                self.tx_reads_left = TX_READS_UNTIL_IDLE;
            }
            SIDLE => self.marc = MARCSTATE_IDLE,
            SFRX => {
                self.rx_fifo.clear();
                self.gdo0 = false;
            }
            SFTX => {
                self.tx_pending.clear();
                self.forced_marc = None;
            }
            _ => {}
        }
    }

    fn read_status(&mut self, addr: u8) -> u8 {
        match addr {
            PARTNUM_ADDR => self.partnum,
            VERSION_ADDR => self.version,
            MARCSTATE_ADDR => {
                if let Some(forced) = self.forced_marc {
                    return forced;
                }
                if self.marc == MARCSTATE_TX {
                    // Each state poll "transmits" whatever is queued.
                    self.tx_pending.clear();
                    if self.tx_reads_left == 0 {
                        self.marc = MARCSTATE_IDLE;
                    } else {
                        self.tx_reads_left -= 1;
                    }
                }
                self.marc
            }
            RSSI_ADDR => self.rssi_raw,
            LQI_ADDR => self.lqi,
            RXBYTES_ADDR => self.rx_fifo.len().min(FIFO_SIZE as usize) as u8,
            TXBYTES_ADDR => self.tx_pending.len().min(FIFO_SIZE as usize) as u8,
            _ => 0,
        }
    }

    fn transfer(&mut self, byte: u8) -> u8 {
        match self.txn {
            Txn::Idle => {
                let addr = byte & 0x3F;
                let read = byte & READ_SINGLE_BYTE != 0;
                let burst = byte & WRITE_BURST != 0;
                if !read && (SRES..=SNOP).contains(&addr) {
                    // Command strobe, single-byte transaction.
                    self.apply_strobe(addr);
                } else if read {
                    self.txn = Txn::Read {
                        addr,
                        burst,
                        done: false,
                    };
                } else {
                    self.txn = Txn::Write {
                        addr,
                        burst,
                        offset: 0,
                    };
                }
                // Chip status byte while the header clocks out.
                self.marc & MARCSTATE_MASK
            }
            Txn::Read { addr, burst, done } => {
                if done {
                    return 0;
                }
                if !burst {
                    self.txn = Txn::Read {
                        addr,
                        burst,
                        done: true,
                    };
                }
                if addr == FIFO_ADDR {
                    self.rx_fifo.pop_front().unwrap_or(0)
                } else if (PARTNUM_ADDR..=STATUS_ADDR_LAST).contains(&addr) {
                    self.read_status(addr)
                } else {
                    self.regs[addr as usize]
                }
            }
            Txn::Write {
                addr,
                burst,
                offset,
            } => {
                match addr {
                    FIFO_ADDR => {
                        self.tx_pending.push(byte);
                        self.tx_log.push(byte);
                    }
                    PATABLE_ADDR => {
                        if (offset as usize) < self.patable.len() {
                            self.patable[offset as usize] = byte;
                        }
                    }
                    _ => {
                        self.regs[addr as usize] = byte;
                        self.write_log.push((addr, byte));
                    }
                }
                if burst {
                    self.txn = Txn::Write {
                        addr,
                        burst,
                        offset: offset.saturating_add(1),
                    };
                } else {
                    self.txn = Txn::Idle;
                }
                self.marc & MARCSTATE_MASK
            }
        }
    }
}

/// Cloneable handle to a simulated CC1101. Clones share the same chip state,
/// so a test can keep one handle for assertions while the driver owns another.
#[derive(Debug, Clone)]
pub struct MockHal {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockHal {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHal {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::new())),
        }
    }

    /// Load the raw byte stream the chip will deliver after a matching SRX.
    pub fn set_reply(&self, stream: Vec<u8>) {
        self.state.lock().unwrap().reply = stream;
    }

    /// Restrict the reply to SRX strobes issued while FREQ2..FREQ0 hold
    /// exactly `word`. `None` replies on any frequency.
    pub fn set_reply_freq_word(&self, word: Option<u32>) {
        self.state.lock().unwrap().reply_freq_word = word;
    }

    pub fn set_rssi_raw(&self, raw: u8) {
        self.state.lock().unwrap().rssi_raw = raw;
    }

    pub fn set_lqi(&self, lqi: u8) {
        self.state.lock().unwrap().lqi = lqi;
    }

    /// Pin MARCSTATE reads to a fixed value until the next SFTX strobe,
    /// e.g. to simulate a TX FIFO underflow or a chip stuck outside RX.
    pub fn force_marcstate(&self, state: u8) {
        self.state.lock().unwrap().forced_marc = Some(state);
    }

    /// Override the identity registers, e.g. to simulate a missing chip.
    pub fn set_chip_id(&self, partnum: u8, version: u8) {
        let mut state = self.state.lock().unwrap();
        state.partnum = partnum;
        state.version = version;
    }

    /// Current value of a config register.
    pub fn reg(&self, addr: u8) -> u8 {
        self.state.lock().unwrap().regs[addr as usize]
    }

    /// PA table contents.
    pub fn patable(&self) -> [u8; 8] {
        self.state.lock().unwrap().patable
    }

    /// Every strobe issued, in order.
    pub fn strobes(&self) -> Vec<u8> {
        self.state.lock().unwrap().strobe_log.clone()
    }

    /// Every byte ever written to the TX FIFO.
    pub fn tx_log(&self) -> Vec<u8> {
        self.state.lock().unwrap().tx_log.clone()
    }

    /// Every config register write as (addr, value), in order.
    pub fn write_log(&self) -> Vec<(u8, u8)> {
        self.state.lock().unwrap().write_log.clone()
    }

    /// Bytes still queued in the RX FIFO.
    pub fn rx_remaining(&self) -> usize {
        self.state.lock().unwrap().rx_fifo.len()
    }
}

impl Hal for MockHal {
    fn spi_transfer(&mut self, byte: u8) -> Result<u8, HalError> {
        let mut state = self.state.lock().unwrap();
        if !state.cs_asserted {
            return Err(HalError::Spi("transfer without chip select".into()));
        }
        Ok(state.transfer(byte))
    }

    fn chip_select(&mut self, asserted: bool) -> Result<(), HalError> {
        let mut state = self.state.lock().unwrap();
        state.cs_asserted = asserted;
        state.txn = Txn::Idle;
        Ok(())
    }

    fn data_ready(&mut self) -> Result<bool, HalError> {
        Ok(self.state.lock().unwrap().gdo0)
    }

    fn delay_us(&mut self, _micros: u32) {}
}
