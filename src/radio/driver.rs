//! Non-blocking meter interrogation driver.
//!
//! [`RadianDriver`] owns the CC1101 and runs two cooperatively scheduled
//! state machines: the read session (wake-up preamble, request transmission,
//! two-stage reply capture, decode) and the frequency discovery sweep. All
//! progress happens inside [`RadianDriver::tick`], which the caller invokes
//! with a monotonic millisecond clock; no state handler sleeps, so a tick
//! never blocks longer than one SPI transaction batch.
//!
//! The interrogation sequence mirrors what the meter expects on the air:
//!
//! 1. A long 0x55 preamble at 38.4 kBaud wakes the meter's receiver.
//! 2. After a short guard gap the sync pattern and serial-framed request
//!    follow in the same carrier burst.
//! 3. The reply comes back in two captures: an optional short acknowledge
//!    (tolerated if absent) and the main data frame, which is captured as a
//!    raw 4x-oversampled bit stream and decoded in software.

use log::{debug, info, trace, warn};

use crate::config::RadioConfig;
use crate::constants::*;
use crate::error::RadianError;
use crate::logging::log_frame_hex;
use crate::radian::{
    build_request, decode_oversampled, oversampled_target, parse_reading, MeterReading,
    DATA_FRAME_SIZE, WAKEUP_BYTE,
};
use crate::radio::cc1101::{rssi_to_dbm, Cc1101, ChipStatus};
use crate::radio::hal::Hal;
use crate::radio::scan::{ScanPhase, ScanSession, RETUNE_SETTLE_MS};
use crate::schedule::{should_read, ActiveHours};

/// Top up the preamble FIFO whenever it drains to this level or below.
const PREAMBLE_REFILL_LEVEL: u8 = FIFO_SIZE - 8;
/// Preamble bytes per top-up.
const PREAMBLE_CHUNK: usize = 8;

/// Minimum decoded reply length carrying the full diagnostic block.
const MIN_FULL_REPLY: usize = 48;

/// Consumer of completed interrogations.
pub trait ReadingSink {
    /// A decoded, plausibility-checked reading.
    fn reading(&mut self, reading: &MeterReading, frequency_mhz: f64);

    /// A requested read ran to completion without a usable reply.
    fn read_failed(&mut self);

    /// Discovery settled on a responding carrier frequency.
    fn frequency_discovered(&mut self, frequency_mhz: f64);
}

/// Sink that discards everything; useful for probes and one-shot tools.
pub struct NullSink;

impl ReadingSink for NullSink {
    fn reading(&mut self, _reading: &MeterReading, _frequency_mhz: f64) {}
    fn read_failed(&mut self) {}
    fn frequency_discovered(&mut self, _frequency_mhz: f64) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    StartPreamble,
    StreamPreamble,
    GuardBeforeRequest,
    StartRequest,
    StreamRequest,
    WaitTxFinish,
    AckSetup,
    AckWaitSync,
    AckFetch,
    DataSetup,
    DataWaitSync,
    DataFetch,
    Decode,
}

/// One in-flight interrogation. Plain data; the driver mutates it from
/// [`RadianDriver::tick`].
struct ReadSession {
    state: ReadState,
    /// Entry time of the current state, for per-state timeouts.
    entered_ms: u64,
    /// Next time the paced states are allowed to act.
    next_action_ms: u64,
    /// Paced preamble top-ups left before the request may start.
    preamble_remaining: u32,
    request: Vec<u8>,
    request_offset: usize,
    /// Raw oversampled capture of the data frame.
    raw: Vec<u8>,
    /// Bytes drained during the acknowledge stage.
    ack_drained: usize,
    /// False for discovery attempts, which must not reach the sink.
    publish: bool,
}

impl ReadSession {
    fn new(now_ms: u64, request: Vec<u8>, publish: bool) -> Self {
        Self {
            state: ReadState::StartPreamble,
            entered_ms: now_ms,
            next_action_ms: now_ms,
            preamble_remaining: 0,
            request,
            request_offset: 0,
            raw: Vec::new(),
            ack_drained: 0,
            publish,
        }
    }

    fn enter(&mut self, state: ReadState, now_ms: u64) {
        trace!("read session: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.entered_ms = now_ms;
    }

    fn elapsed(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.entered_ms)
    }
}

enum Outcome {
    Pending,
    Success(MeterReading),
    Failed,
}

/// CC1101-backed RADIAN meter reader.
pub struct RadianDriver<H: Hal, S: ReadingSink> {
    chip: Cc1101<H>,
    config: RadioConfig,
    sink: S,
    radio_ok: bool,
    session: Option<ReadSession>,
    scan: Option<ScanSession>,
    /// Synthesizer settle deadline between retune and attempt.
    scan_wait_until: Option<u64>,
    /// Coarse sweep hit being refined by the chained fine sweep.
    scan_coarse_hit: Option<f64>,
    active_hours: ActiveHours,
    last_read_ok: Option<bool>,
}

impl<H: Hal, S: ReadingSink> RadianDriver<H, S> {
    pub fn new(hal: H, config: RadioConfig, sink: S) -> Self {
        Self {
            chip: Cc1101::new(hal),
            config,
            sink,
            radio_ok: false,
            session: None,
            scan: None,
            scan_wait_until: None,
            scan_coarse_hit: None,
            active_hours: ActiveHours::default(),
            last_read_ok: None,
        }
    }

    /// Reset and identify the chip, then program the RF profile. Must
    /// succeed before any read or discovery can start; may be called again
    /// to re-detect a radio that was absent at boot.
    pub fn probe(&mut self) -> Result<(), RadianError> {
        self.radio_ok = false;
        self.chip.reset()?;
        self.chip.probe()?;
        self.chip.configure(self.config.frequency_mhz as f64)?;
        self.radio_ok = true;
        info!(
            "radio ready on {:.4} MHz for meter {:02}-{}",
            self.config.frequency_mhz, self.config.meter.year, self.config.meter.serial
        );
        Ok(())
    }

    /// Begin an interrogation. Refused while another session or a discovery
    /// sweep is running.
    pub fn start_read(&mut self, now_ms: u64) -> Result<(), RadianError> {
        if !self.radio_ok {
            return Err(RadianError::NotProbed);
        }
        if self.session.is_some() {
            return Err(RadianError::Busy);
        }
        if self.scan.is_some() {
            return Err(RadianError::Scanning);
        }
        debug!("starting meter read");
        self.session = Some(ReadSession::new(now_ms, self.build_request(), true));
        Ok(())
    }

    /// Begin a discovery sweep. A coarse sweep that finds a responding
    /// carrier chains into a fine sweep around the hit automatically.
    pub fn start_discovery(&mut self, now_ms: u64, phase: ScanPhase) -> Result<(), RadianError> {
        if !self.radio_ok {
            return Err(RadianError::NotProbed);
        }
        if self.session.is_some() {
            return Err(RadianError::Busy);
        }
        if self.scan.is_some() {
            return Err(RadianError::Scanning);
        }
        let center = self.config.frequency_mhz as f64;
        let sweep = match phase {
            ScanPhase::Coarse => match self.config.coarse_scan {
                Some(window) => ScanSession::new(phase, window, crate::radio::scan::COARSE_STEP_MHZ),
                None => ScanSession::coarse_around(center),
            },
            ScanPhase::Fine => match self.config.fine_scan {
                Some(window) => ScanSession::new(phase, window, crate::radio::scan::FINE_STEP_MHZ),
                None => ScanSession::fine_around(center),
            },
        };
        info!(
            "starting {:?} frequency discovery, {} attempts ahead",
            phase,
            sweep.total_attempts()
        );
        self.scan = Some(sweep);
        self.scan_wait_until = None;
        self.scan_coarse_hit = None;
        let _ = now_ms;
        Ok(())
    }

    /// Ask a running sweep to stop. Honored at the next tick; an attempt
    /// already in flight finishes naturally first.
    pub fn cancel_discovery(&mut self) {
        if let Some(scan) = self.scan.as_mut() {
            scan.cancel_requested = true;
        }
    }

    /// Advance whatever is in flight. Call regularly with a monotonic
    /// millisecond clock.
    pub fn tick(&mut self, now_ms: u64) -> Result<(), RadianError> {
        if let Some(mut session) = self.session.take() {
            let outcome = self.step_session(&mut session, now_ms);
            match outcome? {
                Outcome::Pending => self.session = Some(session),
                Outcome::Success(reading) => self.finish_success(session.publish, reading)?,
                Outcome::Failed => self.finish_failure(session.publish)?,
            }
            return Ok(());
        }
        if self.scan.is_some() {
            self.step_scan(now_ms)?;
        }
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_scanning(&self) -> bool {
        self.scan.is_some()
    }

    pub fn frequency_mhz(&self) -> f64 {
        self.config.frequency_mhz as f64
    }

    pub fn active_hours(&self) -> ActiveHours {
        self.active_hours
    }

    /// Outcome of the most recent completed session, if any.
    pub fn last_read_ok(&self) -> Option<bool> {
        self.last_read_ok
    }

    /// Schedule gate: whether a periodic read is worth attempting now, given
    /// the weekday policy and the meter's learned wake window.
    pub fn reading_allowed(&self, weekday: chrono::Weekday, hour: u8) -> bool {
        should_read(self.config.schedule, weekday, hour, &self.active_hours)
    }

    pub fn status(&mut self) -> Result<ChipStatus, RadianError> {
        self.chip.status()
    }

    fn build_request(&self) -> Vec<u8> {
        let frame = build_request(self.config.meter.year, self.config.meter.serial);
        log_frame_hex("tx", &frame);
        frame
    }

    /// One step of the read session state machine. Each call performs at
    /// most one state's worth of SPI traffic.
    fn step_session(
        &mut self,
        session: &mut ReadSession,
        now_ms: u64,
    ) -> Result<Outcome, RadianError> {
        let timings = self.config.timings;
        match session.state {
            ReadState::StartPreamble => {
                self.chip.strobe(SFTX)?;
                // Raw carrier, no sync insertion, infinite packet length.
                self.chip.write_register(MDMCFG2, 0x00)?;
                self.chip.write_register(PKTCTRL0, 0x02)?;
                self.chip.write_fifo(&[WAKEUP_BYTE; PREAMBLE_CHUNK])?;
                self.chip.strobe(STX)?;
                session.preamble_remaining =
                    (timings.preamble_ms / timings.preamble_pace_ms).max(1) as u32;
                session.next_action_ms = now_ms + timings.preamble_pace_ms;
                session.enter(ReadState::StreamPreamble, now_ms);
            }
            ReadState::StreamPreamble => {
                if now_ms < session.next_action_ms {
                    return Ok(Outcome::Pending);
                }
                // The chip drops back to IDLE on a FIFO underflow between
                // paced top-ups; kick it straight back into TX.
                if self.chip.marcstate()? != MARCSTATE_TX {
                    self.chip.strobe(STX)?;
                }
                if self.chip.tx_bytes()? <= PREAMBLE_REFILL_LEVEL {
                    self.chip.write_fifo(&[WAKEUP_BYTE; PREAMBLE_CHUNK])?;
                }
                session.preamble_remaining = session.preamble_remaining.saturating_sub(1);
                if session.preamble_remaining == 0 {
                    session.next_action_ms = now_ms + timings.guard_ms;
                    session.enter(ReadState::GuardBeforeRequest, now_ms);
                } else {
                    session.next_action_ms = now_ms + timings.preamble_pace_ms;
                }
            }
            ReadState::GuardBeforeRequest => {
                if now_ms >= session.next_action_ms {
                    session.enter(ReadState::StartRequest, now_ms);
                }
            }
            ReadState::StartRequest => {
                session.request_offset = 0;
                session.enter(ReadState::StreamRequest, now_ms);
            }
            ReadState::StreamRequest => {
                if self.chip.marcstate()? == MARCSTATE_TX_UNDERFLOW {
                    warn!("TX FIFO underflow while streaming request, restarting TX");
                    self.chip.strobe(SFTX)?;
                    self.chip.strobe(STX)?;
                }
                let used = self.chip.tx_bytes()? as usize;
                let free = (FIFO_SIZE as usize).saturating_sub(used);
                let remaining = session.request.len() - session.request_offset;
                let chunk = free.min(remaining);
                if chunk > 0 {
                    let start = session.request_offset;
                    self.chip
                        .write_fifo(&session.request[start..start + chunk])?;
                    session.request_offset += chunk;
                }
                if session.request_offset >= session.request.len() {
                    session.enter(ReadState::WaitTxFinish, now_ms);
                } else if session.elapsed(now_ms) > timings.tx_stream_timeout_ms {
                    warn!("request streaming timed out");
                    return Ok(Outcome::Failed);
                }
            }
            ReadState::WaitTxFinish => {
                if self.chip.marcstate()? != MARCSTATE_TX {
                    self.chip.strobe(SFTX)?;
                    self.chip.write_register(MDMCFG2, 0x02)?;
                    self.chip.write_register(PKTCTRL0, 0x00)?;
                    session.enter(ReadState::AckSetup, now_ms);
                } else if session.elapsed(now_ms) > timings.tx_drain_timeout_ms {
                    warn!("TX FIFO never drained after the request");
                    self.chip.strobe(SFTX)?;
                    self.chip.write_register(MDMCFG2, 0x02)?;
                    self.chip.write_register(PKTCTRL0, 0x00)?;
                    return Ok(Outcome::Failed);
                }
            }
            ReadState::AckSetup => {
                self.chip.strobe(SFRX)?;
                // Hold RX after a packet; the data frame follows the ack in
                // the same reply burst.
                self.chip.write_register(MCSM1, 0x0F)?;
                self.chip.write_register(MDMCFG2, 0x02)?;
                self.chip.write_register(SYNC1, 0x55)?;
                self.chip.write_register(SYNC0, 0x50)?;
                self.chip.write_register(MDMCFG4, 0xF6)?;
                self.chip.write_register(MDMCFG3, 0x83)?;
                self.chip.write_register(PKTLEN, 0x01)?;
                self.chip.enter_receive()?;
                session.ack_drained = 0;
                session.enter(ReadState::AckWaitSync, now_ms);
            }
            ReadState::AckWaitSync => {
                if self.chip.data_ready()? {
                    session.enter(ReadState::AckFetch, now_ms);
                } else if session.elapsed(now_ms) > timings.ack_timeout_ms {
                    // Some meters skip the acknowledge; move on to the data
                    // frame rather than giving up.
                    debug!("no acknowledge frame, proceeding to data capture");
                    session.enter(ReadState::DataSetup, now_ms);
                }
            }
            ReadState::AckFetch => {
                let available = (self.chip.rx_bytes()? as usize).min(FIFO_SIZE as usize);
                if available > 0 {
                    let mut scratch = [0u8; FIFO_SIZE as usize];
                    self.chip.read_fifo(&mut scratch[..available])?;
                    session.ack_drained += available;
                }
                // The acknowledge carries nothing of interest and the data
                // frame follows right behind it; one drain is enough.
                if session.ack_drained > 0 || session.elapsed(now_ms) > timings.ack_timeout_ms {
                    debug!("drained {} acknowledge bytes", session.ack_drained);
                    session.enter(ReadState::DataSetup, now_ms);
                }
            }
            ReadState::DataSetup => {
                // The data frame is captured as a raw oversampled bit stream:
                // sync on the 0xFFF0 idle-to-start edge, then read everything.
                self.chip.write_register(SYNC1, 0xFF)?;
                self.chip.write_register(SYNC0, 0xF0)?;
                self.chip.write_register(MDMCFG4, 0xF8)?;
                self.chip.write_register(MDMCFG3, 0x83)?;
                self.chip.write_register(PKTCTRL0, 0x02)?;
                self.chip.strobe(SFRX)?;
                self.chip.enter_receive()?;
                session.raw.clear();
                session
                    .raw
                    .reserve(oversampled_target(DATA_FRAME_SIZE));
                session.enter(ReadState::DataWaitSync, now_ms);
            }
            ReadState::DataWaitSync => {
                if self.chip.data_ready()? {
                    session.enter(ReadState::DataFetch, now_ms);
                } else if session.elapsed(now_ms) > timings.data_timeout_ms {
                    warn!("no data frame from the meter");
                    return Ok(Outcome::Failed);
                }
            }
            ReadState::DataFetch => {
                let target = oversampled_target(DATA_FRAME_SIZE);
                let available = (self.chip.rx_bytes()? as usize).min(FIFO_SIZE as usize);
                if available > 0 {
                    let want = available.min(target - session.raw.len());
                    let mut scratch = [0u8; FIFO_SIZE as usize];
                    self.chip.read_fifo(&mut scratch[..want])?;
                    session.raw.extend_from_slice(&scratch[..want]);
                }
                if session.raw.len() >= target {
                    self.chip.strobe(SFRX)?;
                    self.chip.strobe(SIDLE)?;
                    self.restore_rx_defaults()?;
                    // A capture with no idle level anywhere is noise that
                    // happened to trip the sync word.
                    if !session.raw.contains(&0xFF) {
                        warn!("capture contains no idle level, discarding");
                        return Ok(Outcome::Failed);
                    }
                    session.enter(ReadState::Decode, now_ms);
                } else if session.elapsed(now_ms) > timings.data_timeout_ms {
                    warn!(
                        "data capture stalled at {}/{} bytes",
                        session.raw.len(),
                        target
                    );
                    self.restore_rx_defaults()?;
                    return Ok(Outcome::Failed);
                }
            }
            ReadState::Decode => {
                let decoded = decode_oversampled(&session.raw);
                log_frame_hex("rx", &decoded);
                if decoded.len() < MIN_FULL_REPLY {
                    warn!("reply too short: {} decoded bytes", decoded.len());
                    return Ok(Outcome::Failed);
                }
                let mut reading = parse_reading(&decoded);
                if !reading.is_plausible() {
                    warn!("decoded reply carries no plausible data");
                    return Ok(Outcome::Failed);
                }
                let raw_rssi = self.chip.read_rssi_raw()?;
                reading.rssi_raw = Some(raw_rssi);
                reading.rssi_dbm = Some(rssi_to_dbm(raw_rssi));
                reading.lqi = Some(self.chip.read_lqi()?);
                return Ok(Outcome::Success(reading));
            }
        }
        Ok(Outcome::Pending)
    }

    /// Put the modem registers back to the RF profile's receive defaults.
    fn restore_rx_defaults(&mut self) -> Result<(), RadianError> {
        self.chip.write_register(MDMCFG2, 0x02)?;
        self.chip.write_register(MDMCFG4, 0xF6)?;
        self.chip.write_register(MDMCFG3, 0x83)?;
        self.chip.write_register(PKTCTRL0, 0x00)?;
        self.chip.write_register(PKTLEN, 38)?;
        self.chip.write_register(SYNC1, 0x55)?;
        self.chip.write_register(SYNC0, 0x00)?;
        self.chip.write_register(MCSM1, 0x00)?;
        Ok(())
    }

    fn finish_success(
        &mut self,
        publish: bool,
        reading: MeterReading,
    ) -> Result<(), RadianError> {
        self.last_read_ok = Some(true);
        if reading.active_start_hour.is_some() || reading.active_end_hour.is_some() {
            self.active_hours = ActiveHours {
                start: reading.active_start_hour,
                end: reading.active_end_hour,
            };
        }
        info!(
            "meter answered: liters={:?} battery_months={:?} rssi={:?} dBm",
            reading.liters, reading.battery_months, reading.rssi_dbm
        );
        if let Some(scan) = self.scan.take() {
            // A cancel issued while this attempt was in flight lets the
            // attempt finish but must not chain the next phase or adopt
            // the candidate.
            if scan.cancel_requested {
                info!("frequency discovery cancelled");
                self.scan_wait_until = None;
                self.scan_coarse_hit = None;
                self.chip.set_frequency(self.config.frequency_mhz as f64)?;
                return Ok(());
            }
            let hit = scan
                .candidate()
                .unwrap_or(self.config.frequency_mhz as f64);
            match scan.phase {
                ScanPhase::Coarse => {
                    info!("coarse sweep hit at {:.4} MHz, refining", hit);
                    self.scan_coarse_hit = Some(hit);
                    self.scan = Some(ScanSession::fine_around(hit));
                    self.scan_wait_until = None;
                }
                ScanPhase::Fine => {
                    self.adopt_frequency(hit)?;
                    self.sink.frequency_discovered(hit);
                    self.sink.reading(&reading, hit);
                }
            }
        } else if publish {
            self.sink.reading(&reading, self.config.frequency_mhz as f64);
        }
        Ok(())
    }

    fn finish_failure(&mut self, publish: bool) -> Result<(), RadianError> {
        self.last_read_ok = Some(false);
        self.chip.strobe(SFRX)?;
        self.chip.strobe(SFTX)?;
        self.chip.strobe(SIDLE)?;
        self.restore_rx_defaults()?;
        if let Some(scan) = self.scan.as_mut() {
            scan.advance();
        } else if publish {
            self.sink.read_failed();
        }
        Ok(())
    }

    /// One step of the discovery sweep: retune, settle, then launch a
    /// non-publishing interrogation at the candidate frequency.
    fn step_scan(&mut self, now_ms: u64) -> Result<(), RadianError> {
        let cancelled = self
            .scan
            .as_ref()
            .is_some_and(|scan| scan.cancel_requested);
        if cancelled {
            info!("frequency discovery cancelled");
            self.scan = None;
            self.scan_wait_until = None;
            self.scan_coarse_hit = None;
            self.chip.set_frequency(self.config.frequency_mhz as f64)?;
            return Ok(());
        }

        if let Some(until) = self.scan_wait_until {
            if now_ms < until {
                return Ok(());
            }
            self.scan_wait_until = None;
            self.session = Some(ReadSession::new(now_ms, self.build_request(), false));
            return Ok(());
        }

        let candidate = self.scan.as_ref().and_then(|scan| scan.candidate());
        match candidate {
            Some(mhz) => {
                trace!("discovery attempt at {:.5} MHz", mhz);
                self.chip.set_frequency(mhz)?;
                self.scan_wait_until = Some(now_ms + RETUNE_SETTLE_MS);
            }
            None => {
                self.scan = None;
                match self.scan_coarse_hit.take() {
                    // The fine sweep found nothing better; keep the coarse hit.
                    Some(hit) => {
                        self.adopt_frequency(hit)?;
                        self.sink.frequency_discovered(hit);
                    }
                    None => {
                        warn!("frequency discovery found no responding carrier");
                        self.chip.set_frequency(self.config.frequency_mhz as f64)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn adopt_frequency(&mut self, mhz: f64) -> Result<(), RadianError> {
        info!("adopting discovered carrier {:.5} MHz", mhz);
        self.config.frequency_mhz = mhz as f32;
        self.chip.configure(mhz)?;
        Ok(())
    }
}
