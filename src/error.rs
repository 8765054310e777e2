//! # RADIAN Error Handling
//!
//! This module defines the RadianError enum, which represents the different
//! error types that can occur in the radian-rs crate.

use crate::radio::hal::HalError;
use thiserror::Error;

/// Represents the different error types that can occur in the RADIAN crate.
#[derive(Debug, Error)]
pub enum RadianError {
    /// Indicates an error in the underlying SPI/GPIO hardware layer.
    #[error("HAL error: {0}")]
    Hal(#[from] HalError),

    /// The CC1101 identity probe failed; the chip is absent or unpowered.
    #[error("CC1101 not detected (PART=0x{part:02X} VER=0x{version:02X})")]
    ChipNotDetected { part: u8, version: u8 },

    /// The radio has not been probed successfully yet.
    #[error("Radio not probed; call probe() first")]
    NotProbed,

    /// A read session is already in progress.
    #[error("Read already in progress")]
    Busy,

    /// A frequency discovery session is already in progress.
    #[error("Frequency discovery already in progress")]
    Scanning,

    /// Indicates an I/O error while loading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Indicates a malformed configuration file.
    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_json::Error),

    /// Indicates an invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
