//! Frame check sequences used by DF1 serial links.
//!
//! DF1 supports two trailers:
//!
//! | Mode | Size | Algorithm |
//! |------|------|-----------|
//! | [`CheckMode::Bcc`] | 1 byte | two's complement of the 8-bit data sum |
//! | [`CheckMode::Crc16`] | 2 bytes (LE) | CRC-16, poly 0xA001 (reflected 0x8005), init 0 |
//!
//! Both are computed over the *unstuffed* application bytes. The CRC also
//! covers the ETX byte that terminates the frame, the BCC does not.
//!
//! # Example
//!
//! ```
//! use ab_eip::checksum::{bcc, crc16};
//!
//! assert_eq!(bcc(&[0x01, 0x02, 0x03]), 0xFA);
//! assert_eq!(crc16(b"123456789"), 0xBB3D);
//! ```

/// Reflected polynomial of the DF1 CRC-16.
pub const CRC16_POLY: u16 = 0xA001;

/// Initial register value of the DF1 CRC-16.
pub const CRC16_INIT: u16 = 0x0000;

/// Error check appended to a DF1 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CheckMode {
    /// Block check character (1 byte).
    #[default]
    Bcc,
    /// Cyclic redundancy check (2 bytes).
    Crc16,
}

impl CheckMode {
    /// Number of trailer bytes this mode appends.
    pub fn trailer_len(self) -> usize {
        match self {
            CheckMode::Bcc => 1,
            CheckMode::Crc16 => 2,
        }
    }
}

/// Computes the DF1 block check character.
///
/// The sum of all data bytes plus the BCC is zero modulo 256.
pub fn bcc(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum.wrapping_neg()
}

/// Computes the DF1 CRC-16 over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    crc16_update(CRC16_INIT, data)
}

/// Continues a CRC-16 computation with more bytes.
pub fn crc16_update(mut crc: u16, data: &[u8]) -> u16 {
    for byte in data {
        crc ^= u16::from(*byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bcc_reference() {
        assert_eq!(bcc(&[0x01, 0x02, 0x03]), 0xFA);
        assert_eq!(bcc(&[]), 0x00);
        assert_eq!(bcc(&[0x80, 0x80]), 0x00);
    }

    #[test]
    fn test_bcc_sum_is_zero() {
        let frame = hex::decode("07000f003412a202078901 00".replace(' ', "")).unwrap();
        let check = bcc(&frame);
        let total = frame.iter().fold(check, |acc, b| acc.wrapping_add(*b));
        assert_eq!(total, 0);
    }

    #[test]
    fn test_crc16_reference_vector() {
        // CRC-16/ARC check value
        assert_eq!(crc16(b"123456789"), 0xBB3D);
    }

    #[test]
    fn test_crc16_empty() {
        assert_eq!(crc16(&[]), 0x0000);
    }

    #[test]
    fn test_crc16_incremental_matches_one_shot() {
        let data = hex::decode("01000f0001004e0b0200000003").unwrap();
        let (a, b) = data.split_at(5);
        assert_eq!(crc16_update(crc16(a), b), crc16(&data));
    }

    #[test]
    fn test_trailer_len() {
        assert_eq!(CheckMode::Bcc.trailer_len(), 1);
        assert_eq!(CheckMode::Crc16.trailer_len(), 2);
        assert_eq!(CheckMode::default(), CheckMode::Bcc);
    }
}
