//! Helpers for bit access, Logix STRING values and frame dumps.
//!
//! # Example
//!
//! ```
//! use ab_eip::utils::{get_bit, pack_string, unpack_string};
//!
//! // BOOL[] tags are packed 32 bits per DINT
//! assert!(get_bit(0x0000_0020, 5));
//!
//! let bytes = pack_string("Hello").unwrap();
//! assert_eq!(bytes.len(), 88);
//! assert_eq!(unpack_string(&bytes).unwrap(), "Hello");
//! ```

use std::fmt::Write as _;

use crate::error::{EipError, Result};

/// Characters held by a Logix STRING.
pub const STRING_CAPACITY: usize = 82;

/// Bytes of a Logix STRING on the wire: LEN (DINT) + DATA[82] + 2 pad.
pub const STRING_WIRE_SIZE: usize = 4 + STRING_CAPACITY + 2;

/// Gets a single bit from a 32-bit word.
///
/// # Arguments
///
/// * `value` - The DINT to extract from
/// * `bit` - Bit position (0-31, where 0 is LSB)
///
/// # Example
///
/// ```
/// use ab_eip::utils::get_bit;
///
/// let value: u32 = 0b0101;
/// assert!(get_bit(value, 0));
/// assert!(!get_bit(value, 1));
/// assert!(get_bit(value, 2));
/// ```
#[inline]
pub fn get_bit(value: u32, bit: u8) -> bool {
    bit < 32 && (value >> bit) & 1 != 0
}

/// Sets or clears a single bit in a 32-bit word.
///
/// Bits above 31 leave the value unchanged.
#[inline]
pub fn set_bit(value: u32, bit: u8, state: bool) -> u32 {
    if bit >= 32 {
        return value;
    }
    if state {
        value | (1 << bit)
    } else {
        value & !(1 << bit)
    }
}

/// Unpacks a BOOL[] value (little-endian DINTs) into individual bits.
///
/// # Example
///
/// ```
/// use ab_eip::utils::unpack_bools;
///
/// let bits = unpack_bools(&[0x05, 0x00, 0x00, 0x80]);
/// assert_eq!(bits.len(), 32);
/// assert!(bits[0] && !bits[1] && bits[2] && bits[31]);
/// ```
pub fn unpack_bools(data: &[u8]) -> Vec<bool> {
    data.chunks_exact(4)
        .flat_map(|c| {
            let word = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
            (0..32).map(move |bit| get_bit(word, bit))
        })
        .collect()
}

/// Packs bits into little-endian DINTs, padding the last word with zeros.
pub fn pack_bools(bits: &[bool]) -> Vec<u8> {
    bits.chunks(32)
        .flat_map(|chunk| {
            let word = chunk
                .iter()
                .enumerate()
                .fold(0u32, |word, (bit, &state)| set_bit(word, bit as u8, state));
            word.to_le_bytes()
        })
        .collect()
}

/// Encodes text as a Logix STRING structure value.
///
/// # Errors
///
/// Returns `InvalidParameter` if the text is not ASCII or longer than 82
/// characters.
pub fn pack_string(text: &str) -> Result<Vec<u8>> {
    if !text.is_ascii() {
        return Err(EipError::invalid_parameter("value", "STRING must be ASCII"));
    }
    if text.len() > STRING_CAPACITY {
        return Err(EipError::invalid_parameter(
            "value",
            format!("STRING holds at most {STRING_CAPACITY} characters, got {}", text.len()),
        ));
    }
    let mut bytes = Vec::with_capacity(STRING_WIRE_SIZE);
    bytes.extend_from_slice(&(text.len() as u32).to_le_bytes());
    bytes.extend_from_slice(text.as_bytes());
    bytes.resize(STRING_WIRE_SIZE, 0);
    Ok(bytes)
}

/// Decodes a Logix STRING structure value.
///
/// # Errors
///
/// Returns `MalformedResponse` if the length prefix is missing or exceeds the
/// data.
pub fn unpack_string(data: &[u8]) -> Result<String> {
    if data.len() < 4 {
        return Err(EipError::malformed_response(format!(
            "STRING value too short: {} bytes",
            data.len()
        ))
        .with_raw(data));
    }
    let len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let text = data.get(4..4 + len).ok_or_else(|| {
        EipError::malformed_response(format!(
            "STRING length {len} exceeds {} data bytes",
            data.len() - 4
        ))
        .with_raw(data)
    })?;
    Ok(String::from_utf8_lossy(text).into_owned())
}

/// Formats bytes as space-separated hex for trace logs.
///
/// # Example
///
/// ```
/// use ab_eip::utils::hex_dump;
///
/// assert_eq!(hex_dump(&[0x6F, 0x00, 0x1A]), "6f 00 1a");
/// ```
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Formats a 32-bit value as `0x0000_0000`.
pub fn format_hex(value: u32) -> String {
    format!("0x{:04X}_{:04X}", value >> 16, value & 0xFFFF)
}
