//! RADIAN protocol support: checksum, request construction and reply
//! decoding for EverBlu Cyble meter transponders.

pub mod crc;
pub mod frame;

pub use crc::radian_crc;
pub use frame::{
    build_request, decode_oversampled, encode_serial, oversampled_target, parse_reading,
    MeterReading, ACK_FRAME_SIZE, DATA_FRAME_SIZE, SYNC_PATTERN, WAKEUP_BYTE,
};
