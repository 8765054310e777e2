//! RADIAN frame checksum.
//!
//! A reflected CRC-16 over polynomial 0x8408 with zero initial value, i.e.
//! the CRC-16/KERMIT accumulator, except that the returned value has its high
//! and low bytes swapped. The swap is part of the wire format: the meter
//! compares the bytes in that order, so it must be reproduced exactly.

use once_cell::sync::Lazy;

/// Reflected form of the CCITT polynomial 0x1021.
const CRC_POLY: u16 = 0x8408;

static CRC_TABLE: Lazy<[u16; 256]> = Lazy::new(|| {
    let mut table = [0u16; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut crc = 0u16;
        let mut c = i as u16;
        for _ in 0..8 {
            if (crc ^ c) & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC_POLY;
            } else {
                crc >>= 1;
            }
            c >>= 1;
        }
        *entry = crc;
    }
    table
});

/// Compute the RADIAN checksum of `data`.
///
/// Returns the CRC-16/KERMIT value with its bytes swapped, matching the order
/// the meter expects on the wire.
pub fn radian_crc(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        let index = ((crc ^ byte as u16) & 0x00FF) as usize;
        crc = (crc >> 8) ^ CRC_TABLE[index];
    }
    crc.swap_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(radian_crc(&[]), 0);
    }

    #[test]
    fn test_kermit_check_vector_byte_swapped() {
        // CRC-16/KERMIT("123456789") = 0x2189; the RADIAN routine returns it
        // byte-swapped.
        assert_eq!(radian_crc(b"123456789"), 0x8921);
    }

    #[test]
    fn test_table_entry_zero() {
        // Index 0 never sets the low bit, so the table starts at zero and the
        // CRC of any run of zero bytes stays zero.
        assert_eq!(radian_crc(&[0x00; 17]), 0);
    }

    #[test]
    fn test_single_byte_differs_by_position_in_stream() {
        let a = radian_crc(&[0x45, 0x00]);
        let b = radian_crc(&[0x00, 0x45]);
        assert_ne!(a, b);
    }
}
