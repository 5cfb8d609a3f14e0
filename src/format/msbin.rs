//! Microsoft Binary Format (MBF) single-precision floats.
//!
//! QWK `.NDX` files store record positions as 4-byte MBF values. Both
//! layouts are little-endian:
//!
//! ```text
//! IEEE-754:  m3 | m2 | e mmmmmmm | s eeeeeee
//! MBF:       m3 | m2 | s mmmmmmm | eeeeeeee
//! ```
//!
//! The MBF exponent is biased by 129 where IEEE uses 127, and the sign
//! bit lives in the top bit of the most significant mantissa byte.

use crate::error::{QwkError, Result};

/// Convert an IEEE-754 single into its MBF representation.
///
/// Fails with [`QwkError::MsBinOverflow`] when the IEEE exponent byte is
/// `0xFE` (the biased exponent would not fit in eight bits) or `0xFF`
/// (infinities and NaN have no MBF form).
pub fn encode(value: f32) -> Result<[u8; 4]> {
    let ieee = value.to_le_bytes();
    let sign = ieee[3] & 0x80;
    let exponent = (ieee[3] << 1) | (ieee[2] >> 7);

    if exponent >= 0xFE {
        return Err(QwkError::MsBinOverflow(value));
    }

    Ok([ieee[0], ieee[1], sign | (ieee[2] & 0x7F), exponent + 2])
}

/// Convert an MBF value back into an IEEE-754 single.
///
/// An MBF exponent of zero is zero by definition; an exponent of one is
/// below the IEEE range and also decodes to (signed) zero.
pub fn decode(bytes: [u8; 4]) -> f32 {
    let sign = bytes[2] & 0x80;
    if bytes[3] < 2 {
        return if sign != 0 { -0.0 } else { 0.0 };
    }

    let exponent = bytes[3] - 2;
    let ieee = [
        bytes[0],
        bytes[1],
        (exponent << 7) | (bytes[2] & 0x7F),
        sign | (exponent >> 1),
    ];
    f32::from_le_bytes(ieee)
}

/// Encode a record position counter.
///
/// Positions are whole numbers well below 2^24, so the `f32` conversion is
/// exact.
pub fn encode_position(pos: u32) -> Result<[u8; 4]> {
    encode(pos as f32)
}

/// Decode a record position counter, rounding to the nearest integer.
pub fn decode_position(bytes: [u8; 4]) -> u32 {
    decode(bytes).round().max(0.0) as u32
}
