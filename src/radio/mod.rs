//! CC1101 radio stack: HAL, register bus, chip control, the read session
//! driver and frequency discovery.

pub mod bus;
pub mod cc1101;
pub mod driver;
pub mod hal;
pub mod scan;

pub use cc1101::{freq_word_to_mhz, mhz_to_freq_word, rssi_to_dbm, Cc1101, ChipStatus};
pub use driver::{NullSink, RadianDriver, ReadingSink};
pub use scan::{ScanPhase, ScanSession};
