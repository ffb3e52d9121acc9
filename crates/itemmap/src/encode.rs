//! Text encodings used when dumping bitmaps.
//!
//! All functions are pure. Binary digits are written least significant bit
//! first within each byte, which matches the bitmap's own bit order: the
//! n-th character is the n-th item.

use std::fmt::Write as _;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};

/// Lowercase hex, two characters per byte.
#[must_use]
pub fn to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// One `'0'`/`'1'` character per bit, least significant bit of each byte
/// first.
#[must_use]
pub fn to_binary_digits(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 8);
    for byte in data {
        for bit in 0..8 {
            out.push(if byte & (1 << bit) != 0 { '1' } else { '0' });
        }
    }
    out
}

/// RFC 4648 base64 without `=` padding.
///
/// A trailing 2-byte group yields 3 symbols and a trailing single byte
/// yields 2 symbols. Bitmap dumps use this form.
#[must_use]
pub fn to_base64(data: &[u8]) -> String {
    STANDARD_NO_PAD.encode(data)
}

/// RFC 4648 base64 with standard `=` padding.
#[must_use]
pub fn to_base64_padded(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Comma-joined decimal rendering, e.g. `[3, 5, 9]` becomes `"3,5,9"`.
#[must_use]
pub fn to_decimal_list(values: &[u32]) -> String {
    let mut out = String::with_capacity(values.len() * 4);
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{value}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: [u8; 3] = [0xFF, 0x00, 0xAB];

    #[test]
    fn hex_is_lowercase_pairs() {
        assert_eq!(to_hex(&SAMPLE), "ff00ab");
        assert_eq!(to_hex(&[]), "");
        assert_eq!(to_hex(&[0x0F, 0xF0]), "0ff0");
    }

    #[test]
    fn binary_digits_are_lsb_first() {
        let digits = to_binary_digits(&SAMPLE);
        assert_eq!(digits.len(), 24);
        // 0xAB = 0b1010_1011, read from bit 0 upwards.
        assert_eq!(digits, "111111110000000011010101");
        assert_eq!(to_binary_digits(&[0x01]), "10000000");
    }

    #[test]
    fn base64_full_group() {
        assert_eq!(to_base64(&SAMPLE), "/wCr");
        assert_eq!(to_base64_padded(&SAMPLE), "/wCr");
    }

    #[test]
    fn base64_tail_is_unpadded() {
        // Two trailing bytes: three symbols, no '='.
        assert_eq!(to_base64(&[0xFF, 0x00]), "/wA");
        // One trailing byte: two symbols, no '='.
        assert_eq!(to_base64(&[0xFF]), "/w");
        assert_eq!(to_base64(&[0xFF, 0x00, 0xAB, 0x01]), "/wCrAQ");
    }

    #[test]
    fn base64_padded_tail_uses_equals() {
        assert_eq!(to_base64_padded(&[0xFF, 0x00]), "/wA=");
        assert_eq!(to_base64_padded(&[0xFF]), "/w==");
    }

    #[test]
    fn decimal_list_joins_with_commas() {
        assert_eq!(to_decimal_list(&[3, 5, 9]), "3,5,9");
        assert_eq!(to_decimal_list(&[0]), "0");
        assert_eq!(to_decimal_list(&[]), "");
        assert_eq!(to_decimal_list(&[291, 582]), "291,582");
    }
}
