//! # RADIAN Frame Codec
//!
//! Builds the master request frame sent to the meter and recovers the meter's
//! reply from an oversampled capture.
//!
//! The RADIAN link is plain asynchronous serial carried over OOK-style
//! framing with no forward error correction: each payload byte travels as one
//! clear start bit, eight data bits LSB first, and three set stop bits. The
//! receiver captures the channel at roughly four times the transmit bit rate,
//! and [`decode_oversampled`] performs software clock recovery on the raw
//! sample runs. Decoding re-synchronizes on every start bit and truncates at
//! the first stop-bit violation instead of guessing past a framing error.

use crate::radian::crc::radian_crc;
use serde::{Deserialize, Serialize};

/// Synchronization pattern transmitted verbatim (unframed) ahead of the
/// serial-framed request payload.
pub const SYNC_PATTERN: [u8; 9] = [0x50, 0x00, 0x00, 0x00, 0x03, 0xFF, 0xFF, 0xFF, 0xFF];

/// Wake-up preamble byte streamed before the request.
pub const WAKEUP_BYTE: u8 = 0x55;

/// Size byte of the short acknowledge frame the meter may send first.
pub const ACK_FRAME_SIZE: u8 = 0x12;

/// Size byte of the main data frame carrying the reading.
pub const DATA_FRAME_SIZE: u8 = 0x7C;

/// Master request payload template. Offset 4 receives the meter year code,
/// offsets 5-7 the 24-bit serial big-endian, offsets 17-18 the checksum over
/// offsets 0-16.
const REQUEST_TEMPLATE: [u8; 19] = [
    0x13, 0x10, 0x00, 0x45, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x45, 0x20, 0x0A, 0x50, 0x14, 0x00,
    0x0A, 0x40, 0xFF, 0xFF,
];

/// Number of raw oversampled bytes to capture for a reply whose size byte is
/// `size_byte`: the serial framing stretches 8 data bits to 11 line bits, and
/// the capture runs at 4x the line rate.
pub fn oversampled_target(size_byte: u8) -> usize {
    ((size_byte as usize * 11) / 8 + 1) * 4
}

/// A decoded meter reading plus link-quality diagnostics.
///
/// Fields the reply frame was too short to contain stay `None`; absence is
/// never reported as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterReading {
    /// Total registered volume in liters.
    pub liters: Option<u32>,
    /// Meter-side counter of successful interrogations.
    pub reads_counter: Option<u8>,
    /// Estimated remaining battery life in months.
    pub battery_months: Option<u8>,
    /// First hour (0-23) of the meter's daily wake window.
    pub active_start_hour: Option<u8>,
    /// Last hour (0-23) of the meter's daily wake window.
    pub active_end_hour: Option<u8>,
    /// Raw RSSI register value at decode time.
    pub rssi_raw: Option<u8>,
    /// RSSI converted to dBm.
    pub rssi_dbm: Option<i16>,
    /// Link quality indicator register value.
    pub lqi: Option<u8>,
}

impl MeterReading {
    /// True if at least one of the diagnostic fields carries a nonzero value.
    ///
    /// An all-zero reading is indistinguishable from a mis-framed capture and
    /// is rejected by the read session.
    pub fn is_plausible(&self) -> bool {
        self.reads_counter.is_some_and(|v| v != 0)
            || self.battery_months.is_some_and(|v| v != 0)
            || self.liters.is_some_and(|v| v != 0)
    }
}

/// Build the complete wire image of the master request: the sync pattern
/// followed by the serial-framed, checksummed payload.
pub fn build_request(year: u8, serial: u32) -> Vec<u8> {
    let mut payload = REQUEST_TEMPLATE;
    payload[4] = year;
    payload[5..8].copy_from_slice(&serial.to_be_bytes()[1..]);
    let crc = radian_crc(&payload[..17]);
    payload[17..19].copy_from_slice(&crc.to_be_bytes());

    let mut out = Vec::with_capacity(SYNC_PATTERN.len() + payload.len() * 2);
    out.extend_from_slice(&SYNC_PATTERN);
    out.extend_from_slice(&encode_serial(&payload));
    out
}

/// Bit accumulator packing pushed bits MSB first into output bytes.
struct BitWriter {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bits: 0,
        }
    }

    fn push(&mut self, one: bool) {
        if self.bits % 8 == 0 {
            self.bytes.push(0);
        }
        if one {
            let last = self.bytes.last_mut().expect("pushed above");
            *last |= 0x80 >> (self.bits % 8);
        }
        self.bits += 1;
    }
}

/// Serial-frame `payload` for transmission.
///
/// Per byte: one clear start bit, eight data bits LSB first, and three set
/// stop bits between bytes (not after the last). The final output byte is
/// padded with set bits and one literal 0xFF sentinel byte is appended.
pub fn encode_serial(payload: &[u8]) -> Vec<u8> {
    let mut writer = BitWriter::new();
    for (i, &byte) in payload.iter().enumerate() {
        if i > 0 {
            for _ in 0..3 {
                writer.push(true);
            }
        }
        writer.push(false);
        for bit in 0..8 {
            writer.push(byte & (1 << bit) != 0);
        }
    }
    while writer.bits % 8 != 0 {
        writer.push(true);
    }
    writer.bytes.push(0xFF);
    writer.bytes
}

/// Recover serial-framed bytes from a capture taken at roughly 4x the line
/// bit rate.
///
/// Runs of identical polarity are measured and rounded to the nearest
/// multiple of four samples; the rounding remainder is remembered so that a
/// single-sample glitch folds back into the neighbouring run instead of
/// drifting the clock. A per-byte position counter tracks the UART framing:
/// a clear level where a stop bit belongs (position 10) ends decoding, a
/// clear level at position 11 or later is the next start bit and
/// re-synchronizes onto the next byte. Returns the completed bytes; a
/// trailing partial byte is discarded.
pub fn decode_oversampled(raw: &[u8]) -> Vec<u8> {
    if raw.is_empty() {
        return Vec::new();
    }
    let cap = raw.len() / 4 + 2;
    let mut decoded = vec![0u8; cap];
    let mut bit_pol = raw[0] & 0x80 != 0;
    let mut dest_byte = 0usize;
    let mut dest_bit = 0u32;
    let mut run: i32 = 0;
    let mut carry: i32 = 0;

    for &sample_byte in raw {
        let mut cur = sample_byte;
        for _ in 0..8 {
            let pol = cur & 0x80 != 0;
            if pol == bit_pol {
                run += 1;
            } else if run == 1 {
                // Single-sample glitch: absorb it into the carried remainder
                // of the previous rounding rather than emitting a bit.
                bit_pol = pol;
                run = carry + 1;
            } else {
                let logical = (run + 2) / 4;
                carry = run - logical * 4;
                for _ in 0..logical {
                    if dest_bit < 8 && dest_byte < cap {
                        decoded[dest_byte] >>= 1;
                        if bit_pol {
                            decoded[dest_byte] |= 0x80;
                        }
                    }
                    dest_bit += 1;
                    if dest_bit == 10 && !bit_pol {
                        // Stop bit violation; return what decoded cleanly.
                        decoded.truncate(dest_byte);
                        return decoded;
                    }
                    if dest_bit >= 11 && !bit_pol {
                        dest_bit = 0;
                        dest_byte += 1;
                    }
                }
                bit_pol = pol;
                run = 1;
            }
            cur <<= 1;
        }
    }

    decoded.truncate(dest_byte.min(cap));
    decoded
}

/// Extract the reading fields from a decoded reply of length `n`.
///
/// Layout (decoded byte offsets): liters as little-endian u32 at 18 when
/// n >= 30; battery months at 31, wake window start/end hours at 44/45 and
/// the reads counter at 48 when n >= 48. Shorter replies leave the
/// corresponding fields unknown.
pub fn parse_reading(decoded: &[u8]) -> MeterReading {
    let mut reading = MeterReading::default();
    if decoded.len() >= 30 {
        reading.liters = Some(u32::from_le_bytes([
            decoded[18], decoded[19], decoded[20], decoded[21],
        ]));
    }
    if decoded.len() >= 48 {
        reading.battery_months = Some(decoded[31]);
        reading.active_start_hour = Some(decoded[44]);
        reading.active_end_hour = Some(decoded[45]);
        reading.reads_counter = decoded.get(48).copied();
    }
    reading
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Expand each input bit to four samples, MSB first, as a noise-free
    /// capture at exactly 4x the line rate would look.
    fn oversample4(data: &[u8]) -> Vec<u8> {
        let mut writer = BitWriter::new();
        for &byte in data {
            for bit in (0..8).rev() {
                let one = byte & (1 << bit) != 0;
                for _ in 0..4 {
                    writer.push(one);
                }
            }
        }
        writer.bytes
    }

    /// Idle prefix long enough for the decoder to lock, plus a clear byte and
    /// one more idle byte so the final payload byte's runs all get committed.
    fn decode_line(encoded: &[u8]) -> Vec<u8> {
        let mut line = vec![0xFF, 0xFF];
        line.extend_from_slice(encoded);
        line.push(0x00);
        line.push(0xFF);
        decode_oversampled(&oversample4(&line))
    }

    #[test]
    fn test_request_layout() {
        let frame = build_request(0x11, 0x123456);
        // 9 sync bytes + 19 framed bytes at 11 line bits each, less the
        // trailing stop gap, padded, plus the sentinel.
        assert_eq!(frame.len(), 39);
        assert_eq!(&frame[..9], &SYNC_PATTERN);
        assert_eq!(*frame.last().unwrap(), 0xFF);
        // First framed byte: start bit then 0x13 LSB first.
        assert_eq!(frame[9], 0x64);
    }

    #[test]
    fn test_request_identity_and_checksum() {
        let year = 0x10;
        let serial = 0x00ABCDEF;
        let frame = build_request(year, serial);
        let payload = decode_line(&frame[9..]);
        // Leading idle byte from the decoder lock-in, then the payload.
        assert!(payload.len() >= 20);
        let payload = &payload[1..20];
        assert_eq!(payload[4], year);
        assert_eq!(&payload[5..8], &[0xAB, 0xCD, 0xEF]);
        let crc = radian_crc(&payload[..17]);
        assert_eq!(&payload[17..19], &crc.to_be_bytes());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let payload: Vec<u8> = vec![
            0x00, 0xFF, 0x13, 0x10, 0x55, 0xAA, 0x01, 0x80, 0x7F, 0xFE, 0x45, 0x20,
        ];
        let decoded = decode_line(&encode_serial(&payload));
        assert_eq!(decoded.len(), payload.len() + 1);
        assert_eq!(decoded[0], 0xFF);
        assert_eq!(&decoded[1..], &payload[..]);
    }

    #[test]
    fn test_encode_sentinel_and_length() {
        // n framed bytes cost 11 line bits each except the last (8 + start).
        let encoded = encode_serial(&[0x00; 4]);
        let line_bits: usize = 4 * 9 + 3 * 3;
        assert_eq!(encoded.len(), line_bits.div_ceil(8) + 1);
        assert_eq!(*encoded.last().unwrap(), 0xFF);
    }

    #[test]
    fn test_decode_truncates_on_stop_bit_violation() {
        // One clean framed byte, then a byte whose stop bits are driven low.
        let mut writer = BitWriter::new();
        for _ in 0..16 {
            writer.push(true); // idle lock-in
        }
        writer.push(false); // start
        for bit in 0..8 {
            writer.push(0xAAu8 & (1 << bit) != 0);
        }
        writer.push(false); // bogus low where a stop bit belongs
        writer.push(false);
        for _ in 0..8 {
            writer.push(true); // flush
        }
        let decoded = decode_oversampled(&oversample4(&writer.bytes));
        // Only the idle lock-in byte completed before the violation.
        assert_eq!(decoded, vec![0xFF]);
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(decode_oversampled(&[]).is_empty());
    }

    #[test]
    fn test_oversampled_target_formula() {
        assert_eq!(oversampled_target(DATA_FRAME_SIZE), ((0x7C * 11) / 8 + 1) * 4);
        assert_eq!(oversampled_target(0), 4);
    }

    #[test]
    fn test_parse_reading_thresholds() {
        // 29 bytes: too short for anything.
        let reading = parse_reading(&vec![1u8; 29]);
        assert_eq!(reading.liters, None);
        assert!(!reading.is_plausible());

        // 30 bytes: liters only.
        let mut reply = vec![0u8; 30];
        reply[18..22].copy_from_slice(&123_456u32.to_le_bytes());
        let reading = parse_reading(&reply);
        assert_eq!(reading.liters, Some(123_456));
        assert_eq!(reading.battery_months, None);

        // 48 bytes: diagnostics present, but offset 48 itself is past the
        // end, so the reads counter stays unknown.
        let mut reply = vec![0u8; 48];
        reply[31] = 99;
        reply[44] = 8;
        reply[45] = 18;
        let reading = parse_reading(&reply);
        assert_eq!(reading.battery_months, Some(99));
        assert_eq!(reading.active_start_hour, Some(8));
        assert_eq!(reading.active_end_hour, Some(18));
        assert_eq!(reading.reads_counter, None);

        // 49 bytes: the full set.
        let mut reply = vec![0u8; 49];
        reply[48] = 7;
        let reading = parse_reading(&reply);
        assert_eq!(reading.reads_counter, Some(7));
    }

    #[test]
    fn test_is_plausible() {
        let mut reading = MeterReading::default();
        assert!(!reading.is_plausible());
        reading.liters = Some(0);
        assert!(!reading.is_plausible());
        reading.reads_counter = Some(3);
        assert!(reading.is_plausible());
    }
}
