//! Shared helpers for the integration tests: synthetic meter replies, a
//! recording sink and shrunken timing budgets so tick loops stay fast.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use radian_rs::config::{MeterId, RadioConfig, Timings};
use radian_rs::radian::{decode_oversampled, encode_serial, MeterReading};
use radian_rs::radio::ReadingSink;

/// Expand each input bit into four identical samples, MSB first, as a clean
/// capture at exactly four samples per line bit.
pub fn oversample4(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 4);
    let mut acc = 0u8;
    let mut filled = 0u8;
    for &byte in data {
        for bit in (0..8).rev() {
            let sample = if byte & (1 << bit) != 0 { 0x0F } else { 0x00 };
            // Four samples per bit is exactly one nibble.
            acc = (acc << 4) | sample;
            filled += 1;
            if filled == 2 {
                out.push(acc);
                acc = 0;
                filled = 0;
            }
        }
    }
    out
}

/// Decode a serial-framed buffer the way the capture path would see it:
/// preceded by idle carrier and followed by enough level changes to flush
/// the decoder's run accumulator.
pub fn decode_line(encoded: &[u8]) -> Vec<u8> {
    let mut line = vec![0xFF, 0xFF];
    line.extend_from_slice(encoded);
    line.push(0x00);
    line.push(0xFF);
    decode_oversampled(&oversample4(&line))
}

/// Field values baked into [`build_meter_reply`].
#[derive(Debug, Clone, Copy)]
pub struct ReplyFields {
    pub liters: u32,
    pub battery_months: u8,
    pub active_start_hour: u8,
    pub active_end_hour: u8,
    pub reads_counter: u8,
}

impl Default for ReplyFields {
    fn default() -> Self {
        Self {
            liters: 123_456,
            battery_months: 99,
            active_start_hour: 8,
            active_end_hour: 18,
            reads_counter: 3,
        }
    }
}

/// Build the raw oversampled byte stream of a full meter reply.
///
/// The decoder locks onto the idle prefix and emits one leading 0xFF byte, so
/// reply payload byte k lands at decoded offset k + 1; the field offsets
/// below account for that shift. The stream is padded with idle carrier to
/// cover the driver's whole capture window.
pub fn build_meter_reply(fields: ReplyFields) -> Vec<u8> {
    let mut payload = vec![0u8; 100];
    payload[17..21].copy_from_slice(&fields.liters.to_le_bytes());
    payload[30] = fields.battery_months;
    payload[43] = fields.active_start_hour;
    payload[44] = fields.active_end_hour;
    payload[47] = fields.reads_counter;

    let mut line = vec![0xFF, 0xFF];
    line.extend_from_slice(&encode_serial(&payload));
    let mut stream = oversample4(&line);
    while stream.len() < 720 {
        stream.push(0xFF);
    }
    stream
}

#[derive(Debug, Default)]
pub struct SinkLog {
    pub readings: Vec<(MeterReading, f64)>,
    pub failures: usize,
    pub discovered: Vec<f64>,
}

/// Recording sink; clones share the log so a test can keep a handle while
/// the driver owns another.
#[derive(Debug, Clone, Default)]
pub struct TestSink {
    log: Arc<Mutex<SinkLog>>,
}

impl TestSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn readings(&self) -> Vec<(MeterReading, f64)> {
        self.log.lock().unwrap().readings.clone()
    }

    pub fn failures(&self) -> usize {
        self.log.lock().unwrap().failures
    }

    pub fn discovered(&self) -> Vec<f64> {
        self.log.lock().unwrap().discovered.clone()
    }
}

impl ReadingSink for TestSink {
    fn reading(&mut self, reading: &MeterReading, frequency_mhz: f64) {
        self.log
            .lock()
            .unwrap()
            .readings
            .push((*reading, frequency_mhz));
    }

    fn read_failed(&mut self) {
        self.log.lock().unwrap().failures += 1;
    }

    fn frequency_discovered(&mut self, frequency_mhz: f64) {
        self.log.lock().unwrap().discovered.push(frequency_mhz);
    }
}

/// Timing budgets shrunk so a simulated session completes in tens of ticks.
pub fn fast_timings() -> Timings {
    Timings {
        ack_timeout_ms: 50,
        data_timeout_ms: 60,
        preamble_ms: 40,
        preamble_pace_ms: 20,
        guard_ms: 10,
        tx_stream_timeout_ms: 100,
        tx_drain_timeout_ms: 50,
    }
}

/// Standard test configuration: 433.82 MHz, fast timings.
pub fn test_config() -> RadioConfig {
    let mut config = RadioConfig::new(
        433.82,
        MeterId {
            serial: 0x123456,
            year: 16,
        },
    );
    config.timings = fast_timings();
    config
}
