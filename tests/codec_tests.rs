//! End-to-end codec tests: request frames, serial framing and the
//! oversampled reply decoder working against realistic byte streams.

mod common;

use proptest::prelude::*;

use common::{build_meter_reply, decode_line, ReplyFields};
use radian_rs::radian::{
    build_request, decode_oversampled, encode_serial, parse_reading, radian_crc, SYNC_PATTERN,
};

#[test]
fn request_carries_sync_identity_and_checksum() {
    let frame = build_request(16, 0x123456);
    assert_eq!(&frame[..SYNC_PATTERN.len()], &SYNC_PATTERN);

    let payload = decode_line(&frame[SYNC_PATTERN.len()..]);
    // Decoder lock-in byte, then the 19-byte request payload.
    assert_eq!(payload[0], 0xFF);
    let payload = &payload[1..20];
    assert_eq!(payload[4], 16);
    assert_eq!(&payload[5..8], &[0x12, 0x34, 0x56]);
    assert_eq!(&payload[17..19], &radian_crc(&payload[..17]).to_be_bytes());
}

#[test]
fn synthetic_reply_decodes_to_the_injected_fields() {
    let fields = ReplyFields {
        liters: 987_654,
        battery_months: 42,
        active_start_hour: 6,
        active_end_hour: 20,
        reads_counter: 11,
    };
    let stream = build_meter_reply(fields);
    // The driver captures exactly this many bytes for a 0x7C-sized frame.
    let captured = &stream[..((0x7C * 11) / 8 + 1) * 4];
    let decoded = decode_oversampled(captured);
    assert!(decoded.len() >= 49, "decoded {} bytes", decoded.len());

    let reading = parse_reading(&decoded);
    assert_eq!(reading.liters, Some(987_654));
    assert_eq!(reading.battery_months, Some(42));
    assert_eq!(reading.active_start_hour, Some(6));
    assert_eq!(reading.active_end_hour, Some(20));
    assert_eq!(reading.reads_counter, Some(11));
}

#[test]
fn truncated_capture_yields_a_short_reply() {
    let stream = build_meter_reply(ReplyFields::default());
    // A capture cut off mid-frame decodes to fewer bytes than the full
    // diagnostic block needs.
    let decoded = decode_oversampled(&stream[..120]);
    assert!(decoded.len() < 48);
}

proptest! {
    #[test]
    fn framing_round_trips_arbitrary_payloads(payload in prop::collection::vec(any::<u8>(), 1..40)) {
        let decoded = decode_line(&encode_serial(&payload));
        prop_assert!(decoded.len() >= payload.len() + 1);
        prop_assert_eq!(decoded[0], 0xFF);
        prop_assert_eq!(&decoded[1..=payload.len()], &payload[..]);
    }

    #[test]
    fn request_identity_round_trips(year in 0u8..=99, serial in 0u32..=0x00FF_FFFF) {
        let frame = build_request(year, serial);
        let payload = decode_line(&frame[SYNC_PATTERN.len()..]);
        let payload = &payload[1..20];
        prop_assert_eq!(payload[4], year);
        let mut serial_bytes = [0u8; 4];
        serial_bytes[1..].copy_from_slice(&payload[5..8]);
        prop_assert_eq!(u32::from_be_bytes(serial_bytes), serial);
        prop_assert_eq!(&payload[17..19], &radian_crc(&payload[..17]).to_be_bytes()[..]);
    }
}
