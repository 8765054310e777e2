//! Logging helpers for the RADIAN stack.
//!
//! Thin wrappers around the `log` facade plus hex dump helpers used when
//! tracing raw register traffic and frame buffers.

use log::{debug, log_enabled, Level};

/// Initializes the logger with the `env_logger` crate.
///
/// Honours `RUST_LOG`, e.g. `RUST_LOG=radian_rs=debug`.
pub fn init_logger() {
    env_logger::init();
}

/// Logs a frame buffer as hex at debug level, prefixed with a direction tag.
///
/// Long buffers are truncated to the first 64 bytes; the full length is
/// always reported.
pub fn log_frame_hex(direction: &str, frame: &[u8]) {
    if !log_enabled!(Level::Debug) {
        return;
    }
    const DUMP_LIMIT: usize = 64;
    if frame.len() <= DUMP_LIMIT {
        debug!("{} ({} bytes): {}", direction, frame.len(), hex::encode(frame));
    } else {
        debug!(
            "{} ({} bytes): {}...",
            direction,
            frame.len(),
            hex::encode(&frame[..DUMP_LIMIT])
        );
    }
}
