//! CC1101 Register and Command Constants
//!
//! This module defines the register addresses, command strobes and access-mode
//! opcodes of the TI CC1101 sub-GHz transceiver, as used by the RADIAN meter
//! reading stack.

/// Single-byte register write access mode
pub const WRITE_SINGLE_BYTE: u8 = 0x00;

/// Burst register write access mode
pub const WRITE_BURST: u8 = 0x40;

/// Single-byte register read access mode
pub const READ_SINGLE_BYTE: u8 = 0x80;

/// Burst register read access mode (also required for status registers)
pub const READ_BURST: u8 = 0xC0;

// ----------------------------------------------------------------------------
// Configuration registers
// ----------------------------------------------------------------------------

/// GDO2 output pin configuration
pub const IOCFG2: u8 = 0x00;

/// GDO0 output pin configuration
pub const IOCFG0: u8 = 0x02;

/// RX FIFO and TX FIFO thresholds
pub const FIFOTHR: u8 = 0x03;

/// Sync word, high byte
pub const SYNC1: u8 = 0x04;

/// Sync word, low byte
pub const SYNC0: u8 = 0x05;

/// Packet length
pub const PKTLEN: u8 = 0x06;

/// Packet automation control 1
pub const PKTCTRL1: u8 = 0x07;

/// Packet automation control 0
pub const PKTCTRL0: u8 = 0x08;

/// Frequency synthesizer control
pub const FSCTRL1: u8 = 0x0B;

/// Frequency control word, high byte
pub const FREQ2: u8 = 0x0D;

/// Frequency control word, middle byte
pub const FREQ1: u8 = 0x0E;

/// Frequency control word, low byte
pub const FREQ0: u8 = 0x0F;

/// Modem configuration 4 (channel bandwidth / symbol rate exponent)
pub const MDMCFG4: u8 = 0x10;

/// Modem configuration 3 (symbol rate mantissa)
pub const MDMCFG3: u8 = 0x11;

/// Modem configuration 2 (modulation format, sync mode)
pub const MDMCFG2: u8 = 0x12;

/// Modem configuration 1
pub const MDMCFG1: u8 = 0x13;

/// Modem configuration 0
pub const MDMCFG0: u8 = 0x14;

/// Modem deviation setting
pub const DEVIATN: u8 = 0x15;

/// Main radio control state machine configuration 1
pub const MCSM1: u8 = 0x17;

/// Main radio control state machine configuration 0
pub const MCSM0: u8 = 0x18;

/// Frequency offset compensation configuration
pub const FOCCFG: u8 = 0x19;

/// Bit synchronization configuration
pub const BSCFG: u8 = 0x1A;

/// AGC control 2
pub const AGCCTRL2: u8 = 0x1B;

/// AGC control 1
pub const AGCCTRL1: u8 = 0x1C;

/// AGC control 0
pub const AGCCTRL0: u8 = 0x1D;

/// Wake-on-radio control
pub const WORCTRL: u8 = 0x20;

/// Front end TX configuration
pub const FREND1: u8 = 0x21;

/// Frequency synthesizer calibration 3
pub const FSCAL3: u8 = 0x23;

/// Frequency synthesizer calibration 2
pub const FSCAL2: u8 = 0x24;

/// Frequency synthesizer calibration 1
pub const FSCAL1: u8 = 0x25;

/// Frequency synthesizer calibration 0
pub const FSCAL0: u8 = 0x26;

/// Test register 2
pub const TEST2: u8 = 0x2C;

/// Test register 1
pub const TEST1: u8 = 0x2D;

/// Test register 0
pub const TEST0: u8 = 0x2E;

// ----------------------------------------------------------------------------
// Status registers (must be read with the burst-read access mode)
// ----------------------------------------------------------------------------

/// Chip part number
pub const PARTNUM_ADDR: u8 = 0x30;

/// Chip version number
pub const VERSION_ADDR: u8 = 0x31;

/// Frequency offset estimate
pub const FREQEST_ADDR: u8 = 0x32;

/// Link quality indicator of the last received packet
pub const LQI_ADDR: u8 = 0x33;

/// Received signal strength indication
pub const RSSI_ADDR: u8 = 0x34;

/// Main radio control state machine state
pub const MARCSTATE_ADDR: u8 = 0x35;

/// Number of bytes in the TX FIFO
pub const TXBYTES_ADDR: u8 = 0x3A;

/// Number of bytes in the RX FIFO
pub const RXBYTES_ADDR: u8 = 0x3B;

/// First status register address
pub const STATUS_ADDR_FIRST: u8 = 0x30;

/// Last status register address
pub const STATUS_ADDR_LAST: u8 = 0x3D;

// ----------------------------------------------------------------------------
// PATABLE / FIFO
// ----------------------------------------------------------------------------

/// Power amplifier table address
pub const PATABLE_ADDR: u8 = 0x3E;

/// TX/RX FIFO address (direction selected by the access mode)
pub const FIFO_ADDR: u8 = 0x3F;

/// Mask for the byte counts in TXBYTES/RXBYTES
pub const FIFO_BYTES_MASK: u8 = 0x7F;

/// Usable FIFO depth in bytes
pub const FIFO_SIZE: u8 = 64;

// ----------------------------------------------------------------------------
// Command strobes
// ----------------------------------------------------------------------------

/// Reset chip
pub const SRES: u8 = 0x30;

/// Enable RX
pub const SRX: u8 = 0x34;

/// Enable TX
pub const STX: u8 = 0x35;

/// Exit RX/TX, go to idle
pub const SIDLE: u8 = 0x36;

/// Flush the RX FIFO
pub const SFRX: u8 = 0x3A;

/// Flush the TX FIFO
pub const SFTX: u8 = 0x3B;

/// No operation (returns chip status)
pub const SNOP: u8 = 0x3D;

// ----------------------------------------------------------------------------
// MARCSTATE values (register 0x35, low 5 bits)
// ----------------------------------------------------------------------------

/// Mask for the state field of MARCSTATE
pub const MARCSTATE_MASK: u8 = 0x1F;

/// Chip idle
pub const MARCSTATE_IDLE: u8 = 0x01;

/// Chip transmitting
pub const MARCSTATE_TX: u8 = 0x02;

/// First of the "in RX" states (0x0D..=0x0F)
pub const MARCSTATE_RX_FIRST: u8 = 0x0D;

/// Last of the "in RX" states
pub const MARCSTATE_RX_LAST: u8 = 0x0F;

/// TX FIFO underflowed; requires SFTX to recover
pub const MARCSTATE_TX_UNDERFLOW: u8 = 0x16;

/// True if the masked MARCSTATE value is one of the "in RX" states.
pub fn marcstate_is_rx(state: u8) -> bool {
    (MARCSTATE_RX_FIRST..=MARCSTATE_RX_LAST).contains(&(state & MARCSTATE_MASK))
}
