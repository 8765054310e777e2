//! # radian-rs
//!
//! Reader for EverBlu Cyble water and gas meters over the RADIAN radio
//! protocol, using a TI CC1101 sub-GHz transceiver.
//!
//! The crate is layered bottom-up:
//!
//! - [`radio::hal`]: platform traits for SPI/GPIO access, with a mock chip
//!   for tests and an optional Raspberry Pi backend (`raspberry-pi` feature)
//! - [`radio::bus`]: chip-select bracketed register transactions
//! - [`radio::cc1101`]: chip lifecycle, RF profile, frequency and RSSI math
//! - [`radian`]: the protocol itself, from checksum and request frames to the
//!   oversampled reply decoder
//! - [`radio::driver`]: the non-blocking interrogation state machine and
//!   frequency discovery sweeps
//! - [`schedule`]: weekday and active-hours gating for periodic reads
//!
//! ## Usage
//!
//! ```rust
//! use radian_rs::config::{MeterId, RadioConfig};
//! use radian_rs::radio::hal::mock::MockHal;
//! use radian_rs::radio::{NullSink, RadianDriver};
//!
//! let config = RadioConfig::new(433.82, MeterId { serial: 123456, year: 16 });
//! let mut driver = RadianDriver::new(MockHal::new(), config, NullSink);
//! driver.probe().expect("chip present");
//! driver.start_read(0).expect("idle");
//! // Pump the state machine with a monotonic millisecond clock.
//! for now_ms in (0..100).map(|t| t * 5) {
//!     driver.tick(now_ms).expect("radio reachable");
//! }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod radian;
pub mod radio;
pub mod schedule;

pub use config::{MeterId, RadioConfig, ScanWindow, Timings};
pub use error::RadianError;
pub use radian::MeterReading;
pub use radio::{NullSink, RadianDriver, ReadingSink, ScanPhase};
pub use schedule::{should_read, ActiveHours, WorkWeek};
