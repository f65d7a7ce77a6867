//! Small, pure helpers shared by the size, serialize and deserialize
//! engines: size checks, constant-equality checks, and switch-branch lookup.

use ethnum::U256;

use crate::error::Error;
use crate::item::{SwitchBranch, SwitchItem};
use crate::value::Value;

/// `Error::SizeMismatch` unless `expected == actual`.
pub fn check_size(expected: usize, actual: usize) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::SizeMismatch { expected, actual })
    }
}

/// Enforces a bytes item's declared `size`, if it has one.
pub fn check_item_size(declared: Option<usize>, observed: usize) -> Result<(), Error> {
    match declared {
        Some(expected) => check_size(expected, observed),
        None => Ok(()),
    }
}

/// Numeric equality by value, across `Value::Int`/`Value::UInt`, with a
/// strict (not loose/representation) comparison: an unsigned value equals a
/// signed one only if the signed one is non-negative and the two denote the
/// same mathematical integer.
pub fn num_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::UInt(x), Value::UInt(y)) => x == y,
        (Value::Int(s), Value::UInt(u)) | (Value::UInt(u), Value::Int(s)) => {
            unsigned_as_nonnegative_signed(*u) == Some(*s)
        }
        _ => false,
    }
}

/// Reinterprets a `U256` as an `I256` if and only if it fits in the
/// non-negative half of the signed range (its top bit is clear).
fn unsigned_as_nonnegative_signed(u: U256) -> Option<ethnum::I256> {
    unsigned_as_signed(u)
}

/// Reinterprets a `U256` as an `I256`, but only when doing so preserves its
/// mathematical value (top bit clear). Used when a field declared `uint` is
/// fed a value carried as `Value::Int`, or vice versa.
pub fn unsigned_as_signed(u: U256) -> Option<ethnum::I256> {
    if u.leading_zeros() >= 1 {
        Some(ethnum::I256::from_le_bytes(u.to_le_bytes()))
    } else {
        None
    }
}

/// Reinterprets a non-negative `I256` as a `U256`. `None` if the value is negative.
pub fn signed_as_uint(i: ethnum::I256) -> Option<U256> {
    if i < ethnum::I256::ZERO {
        None
    } else {
        Some(U256::from_le_bytes(i.to_le_bytes()))
    }
}

/// `Error::ConstantMismatch` unless the numeric constant equals the observed value.
pub fn check_num_equals(constant: &Value, observed: &Value) -> Result<(), Error> {
    if num_eq(constant, observed) {
        Ok(())
    } else {
        Err(Error::ConstantMismatch {
            expected: format!("{constant:?}"),
            actual: format!("{observed:?}"),
        })
    }
}

/// Byte-wise equality of a constant against an observed slice, with optional
/// sub-ranges to compare on either side (used when only part of a buffer
/// needs to match, e.g. comparing a carved sub-chunk to a shorter constant).
pub fn check_bytes_equal(
    constant: &[u8],
    observed: &[u8],
    constant_range: Option<std::ops::Range<usize>>,
    observed_range: Option<std::ops::Range<usize>>,
) -> Result<(), Error> {
    let expected = constant_range.map(|r| &constant[r]).unwrap_or(constant);
    let actual = observed_range.map(|r| &observed[r]).unwrap_or(observed);
    if expected == actual {
        Ok(())
    } else {
        Err(Error::ConstantMismatch {
            expected: hex_preview(expected),
            actual: hex_preview(actual),
        })
    }
}

fn hex_preview(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2 + 2);
    s.push_str("0x");
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Narrows a `U256` decoded from a length or id prefix (at most 6 bytes, by
/// construction) down to a `u64`. `None` if the high bytes are non-zero,
/// which should only happen for malformed input.
pub fn u256_to_u64(v: U256) -> Option<u64> {
    let bytes = v.to_le_bytes();
    if bytes[8..].iter().any(|&b| b != 0) {
        return None;
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    Some(u64::from_le_bytes(buf))
}

/// As [`u256_to_u64`], narrowed further to `usize` (byte counts and element
/// counts are always used as indices/lengths on this platform).
pub fn u256_to_usize(v: U256) -> Option<usize> {
    u256_to_u64(v).and_then(|n| usize::try_from(n).ok())
}

/// Finds the `(id, layout)` pair whose id matches `data[idTag]`, comparing
/// either against the plain id or the user-label half of a remapped id.
/// A missing match is a caller-level error.
pub fn find_id_layout_pair<'a>(switch: &'a SwitchItem, data: &Value) -> Result<&'a SwitchBranch, Error> {
    let tag_value = data
        .field(&switch.id_tag)
        .ok_or_else(|| Error::UnknownField(switch.id_tag.clone()))?;
    switch
        .branch_for_decoded(tag_value)
        .ok_or_else(|| Error::UnknownField(switch.id_tag.clone()))
}
