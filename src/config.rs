//! Driver configuration: RF parameters, meter identity and timing budgets.
//!
//! Configuration is plain serde data loadable from a JSON file. Every timing
//! budget of the read session state machine is explicit here so deployments
//! can tune pacing against slow buses, and so tests can shrink the budgets.

use crate::error::RadianError;
use crate::schedule::WorkWeek;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identity of the meter being interrogated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeterId {
    /// Meter serial number; only the low 24 bits go on the wire.
    pub serial: u32,
    /// One-byte production year code.
    pub year: u8,
}

/// Timing budgets for the read session state machine, in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Budget for the optional short-ack stages (sync wait and fetch).
    pub ack_timeout_ms: u64,
    /// Budget for the main data frame stages (sync wait and fetch).
    pub data_timeout_ms: u64,
    /// Total wake-up preamble duration.
    pub preamble_ms: u64,
    /// Pacing interval between preamble FIFO top-ups.
    pub preamble_pace_ms: u64,
    /// Guard delay between the preamble and the request frame.
    pub guard_ms: u64,
    /// Budget for streaming the request into the TX FIFO.
    pub tx_stream_timeout_ms: u64,
    /// Budget for the TX FIFO to drain after the last request byte.
    pub tx_drain_timeout_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 500,
            data_timeout_ms: 2000,
            preamble_ms: 2500,
            preamble_pace_ms: 20,
            guard_ms: 200,
            tx_stream_timeout_ms: 2000,
            tx_drain_timeout_ms: 700,
        }
    }
}

/// An absolute frequency window for discovery sweeps, in MHz.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScanWindow {
    pub start_mhz: f32,
    pub end_mhz: f32,
}

impl ScanWindow {
    /// Returns the window with its bounds in ascending order.
    pub fn normalized(self) -> Self {
        if self.start_mhz <= self.end_mhz {
            self
        } else {
            Self {
                start_mhz: self.end_mhz,
                end_mhz: self.start_mhz,
            }
        }
    }
}

/// Complete driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Carrier frequency in MHz; updated in memory by successful discovery.
    pub frequency_mhz: f32,
    /// Meter identity used to sign the request frame.
    pub meter: MeterId,
    /// Weekday policy for the schedule gate.
    #[serde(default)]
    pub schedule: WorkWeek,
    /// Timing budgets for the read session.
    #[serde(default)]
    pub timings: Timings,
    /// Optional absolute window for the coarse discovery sweep.
    #[serde(default)]
    pub coarse_scan: Option<ScanWindow>,
    /// Optional absolute window for the fine discovery sweep.
    #[serde(default)]
    pub fine_scan: Option<ScanWindow>,
}

impl RadioConfig {
    /// Create a configuration with default timings for the given meter.
    pub fn new(frequency_mhz: f32, meter: MeterId) -> Self {
        Self {
            frequency_mhz,
            meter,
            schedule: WorkWeek::default(),
            timings: Timings::default(),
            coarse_scan: None,
            fine_scan: None,
        }
    }

    /// Load a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RadianError> {
        let text = std::fs::read_to_string(path)?;
        let config: RadioConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), RadianError> {
        if !(300.0..=928.0).contains(&self.frequency_mhz) {
            return Err(RadianError::InvalidConfig(format!(
                "frequency {} MHz outside CC1101 range",
                self.frequency_mhz
            )));
        }
        if self.meter.serial > 0x00FF_FFFF {
            return Err(RadianError::InvalidConfig(format!(
                "meter serial 0x{:08X} wider than 24 bits",
                self.meter.serial
            )));
        }
        if self.timings.preamble_pace_ms == 0 {
            return Err(RadianError::InvalidConfig(
                "preamble_pace_ms must be nonzero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let t = Timings::default();
        assert_eq!(t.preamble_ms, 2500);
        assert_eq!(t.preamble_pace_ms, 20);
        assert_eq!(t.data_timeout_ms, 2000);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = RadioConfig::new(
            433.82,
            MeterId {
                serial: 123_456,
                year: 17,
            },
        );
        let json = serde_json::to_string(&config).unwrap();
        let back: RadioConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.frequency_mhz, config.frequency_mhz);
        assert_eq!(back.meter.serial, 123_456);
        assert_eq!(back.meter.year, 17);
    }

    #[test]
    fn test_config_defaults_from_sparse_json() {
        let json = r#"{"frequency_mhz": 433.82, "meter": {"serial": 99, "year": 16}}"#;
        let config: RadioConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.timings.ack_timeout_ms, 500);
        assert!(config.coarse_scan.is_none());
    }

    #[test]
    fn test_validate_rejects_wide_serial() {
        let config = RadioConfig::new(
            433.82,
            MeterId {
                serial: 0x0100_0000,
                year: 16,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scan_window_normalized() {
        let w = ScanWindow {
            start_mhz: 433.87,
            end_mhz: 433.77,
        }
        .normalized();
        assert!(w.start_mhz < w.end_mhz);
    }
}
