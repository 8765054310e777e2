//! Frequency discovery sweep planning.
//!
//! Meters drift off their nominal carrier with age and temperature. Discovery
//! walks a window of candidate frequencies, attempting a full interrogation at
//! each, first in a coarse 1 kHz grid and then in a fine 250 Hz grid centred
//! on the coarse hit. Each sweep covers its window twice, ascending then
//! descending, so a marginal candidate gets a second attempt.

use crate::config::ScanWindow;

/// Half-span of the default coarse window around the configured carrier, MHz.
pub const COARSE_HALF_SPAN_MHZ: f64 = 0.050;
/// Coarse grid pitch, MHz.
pub const COARSE_STEP_MHZ: f64 = 0.001;
/// Half-span of the fine window around a coarse hit, MHz.
pub const FINE_HALF_SPAN_MHZ: f64 = 0.010;
/// Fine grid pitch, MHz.
pub const FINE_STEP_MHZ: f64 = 0.00025;

/// Synthesizer settle time after retuning, before an attempt, in ms.
pub const RETUNE_SETTLE_MS: u64 = 20;

/// Which grid a sweep is walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Coarse,
    Fine,
}

/// One in-progress sweep over a candidate grid.
///
/// Plain data; the driver owns the radio traffic and calls back in here for
/// the next candidate. Candidates are computed from the window edge by index
/// so float error never accumulates across steps.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub phase: ScanPhase,
    low_mhz: f64,
    step_mhz: f64,
    steps: u32,
    index: u32,
    descending: bool,
    exhausted: bool,
    /// Set when the caller asked for the sweep to stop at the next tick.
    pub cancel_requested: bool,
}

impl ScanSession {
    pub fn new(phase: ScanPhase, window: ScanWindow, step_mhz: f64) -> Self {
        let window = window.normalized();
        Self::from_span(phase, window.start_mhz as f64, window.end_mhz as f64, step_mhz)
    }

    fn from_span(phase: ScanPhase, low_mhz: f64, high_mhz: f64, step_mhz: f64) -> Self {
        let steps = ((high_mhz - low_mhz) / step_mhz).round() as u32 + 1;
        Self {
            phase,
            low_mhz,
            step_mhz,
            steps,
            index: 0,
            descending: false,
            exhausted: false,
            cancel_requested: false,
        }
    }

    /// Default coarse sweep centred on `center_mhz`.
    pub fn coarse_around(center_mhz: f64) -> Self {
        Self::from_span(
            ScanPhase::Coarse,
            center_mhz - COARSE_HALF_SPAN_MHZ,
            center_mhz + COARSE_HALF_SPAN_MHZ,
            COARSE_STEP_MHZ,
        )
    }

    /// Fine sweep centred on a coarse hit.
    pub fn fine_around(center_mhz: f64) -> Self {
        Self::from_span(
            ScanPhase::Fine,
            center_mhz - FINE_HALF_SPAN_MHZ,
            center_mhz + FINE_HALF_SPAN_MHZ,
            FINE_STEP_MHZ,
        )
    }

    /// Frequency to try next, or `None` once both passes are done.
    pub fn candidate(&self) -> Option<f64> {
        if self.exhausted {
            return None;
        }
        Some(self.low_mhz + self.index as f64 * self.step_mhz)
    }

    /// Move to the next grid point: ascend through the window, then walk it
    /// once more descending.
    pub fn advance(&mut self) {
        if self.exhausted {
            return;
        }
        if !self.descending {
            if self.index + 1 < self.steps {
                self.index += 1;
            } else {
                self.descending = true;
            }
        } else if self.index > 0 {
            self.index -= 1;
        } else {
            self.exhausted = true;
        }
    }

    /// Total attempts a full sweep makes (both passes).
    pub fn total_attempts(&self) -> u32 {
        self.steps * 2
    }
}
