//! Wire encoding of widened integers.
//!
//! Every numeric item, regardless of its declared byte width, is carried
//! internally as a 256-bit [`I256`]/[`U256`] (the base spec distinguishes
//! sizes ≤ 6, safe in a 64-bit float, from larger arbitrary-precision sizes;
//! since Rust has no such float-safety concern, this implementation simply
//! always widens, narrowing only at the byte boundary declared by `size`).

use ethnum::{I256, U256};
use smallvec::SmallVec;

use crate::error::Error;
use crate::item::Endianness;

/// A numeric field is at most 32 bytes wide (§3's arbitrary-precision
/// ceiling), so its wire encoding never needs a heap allocation — a
/// `SmallVec` inline buffer covers every declared `size` without spilling.
pub type WireBytes = SmallVec<[u8; 32]>;

/// `0 <= value < 2^(8*size)`, i.e. the value fits in an unsigned field of
/// `size` bytes. `size` must be in `1..=32`.
pub fn check_uint_range(value: U256, size: u8) -> Result<(), Error> {
    if size == 32 {
        return Ok(());
    }
    let limit = U256::ONE << (8 * size as u32);
    if value < limit {
        Ok(())
    } else {
        Err(Error::OutOfRange { size, kind: "unsigned integer" })
    }
}

/// `-2^(8*size-1) <= value < 2^(8*size-1)`, i.e. the value fits in a signed
/// two's-complement field of `size` bytes. `size` must be in `1..=32`.
pub fn check_int_range(value: I256, size: u8) -> Result<(), Error> {
    if size == 32 {
        return Ok(());
    }
    let limit = I256::ONE << (8 * size as u32 - 1);
    if value >= -limit && value < limit {
        Ok(())
    } else {
        Err(Error::OutOfRange { size, kind: "signed integer" })
    }
}

/// Encodes `value` (already range-checked) as exactly `size` bytes in the
/// given byte order.
pub fn encode_uint(value: U256, size: u8, endianness: Endianness) -> WireBytes {
    let full = value.to_be_bytes();
    let size = size as usize;
    let mut out: WireBytes = SmallVec::from_slice(&full[32 - size..]);
    if endianness == Endianness::Little {
        out.reverse();
    }
    out
}

/// Encodes `value` (already range-checked) as exactly `size` bytes of
/// two's-complement, in the given byte order.
pub fn encode_int(value: I256, size: u8, endianness: Endianness) -> WireBytes {
    let full = value.to_be_bytes();
    let size = size as usize;
    let mut out: WireBytes = SmallVec::from_slice(&full[32 - size..]);
    if endianness == Endianness::Little {
        out.reverse();
    }
    out
}

/// Decodes an unsigned integer from exactly `bytes.len()` bytes in the given
/// byte order.
pub fn decode_uint(bytes: &[u8], endianness: Endianness) -> U256 {
    let mut buf = [0u8; 32];
    let size = bytes.len();
    match endianness {
        Endianness::Big => buf[32 - size..].copy_from_slice(bytes),
        Endianness::Little => {
            for (i, b) in bytes.iter().rev().enumerate() {
                buf[32 - size + i] = *b;
            }
        }
    }
    U256::from_be_bytes(buf)
}

/// Decodes a signed integer from exactly `bytes.len()` bytes in the given
/// byte order, sign-extending from the high bit of the first byte (big
/// endian) or the last byte (little endian).
pub fn decode_int(bytes: &[u8], endianness: Endianness) -> I256 {
    let size = bytes.len();
    let sign_byte = match endianness {
        Endianness::Big => bytes[0],
        Endianness::Little => bytes[size - 1],
    };
    let fill = if sign_byte & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut buf = [fill; 32];
    match endianness {
        Endianness::Big => buf[32 - size..].copy_from_slice(bytes),
        Endianness::Little => {
            for (i, b) in bytes.iter().rev().enumerate() {
                buf[32 - size + i] = *b;
            }
        }
    }
    I256::from_be_bytes(buf)
}
