//! The decoded value representation.
//!
//! The codec core is untyped — there is no derive macro translating a host
//! struct into wire bytes — so decoding has to land somewhere. [`Value`] is
//! that landing spot: a small closed sum type over exactly what this crate's
//! items can produce, modeled on `spacetimedb_sats::AlgebraicValue`'s shape
//! (primitives, arrays, products) but pared down to this codec's needs.
//!
//! `Object` keeps fields in declaration order (a `Vec` of pairs, not a map)
//! because layouts are ordered and error messages want to name fields the
//! way the layout declared them.

use enum_as_inner::EnumAsInner;
use ethnum::{I256, U256};

/// A decoded (or to-be-encoded) value.
#[derive(Clone, Debug, PartialEq, Eq, EnumAsInner)]
pub enum Value {
    /// The decoded form of an `int` item; always held widened to 256 bits
    /// regardless of the item's declared `size`.
    Int(I256),
    /// The decoded form of a `uint` item.
    UInt(U256),
    /// The decoded form of a `bytes` item without a conversion (or whose
    /// conversion target is a byte string).
    Bytes(Vec<u8>),
    /// The decoded form of an `array` item.
    Array(Vec<Value>),
    /// The decoded form of a proper layout (a sequence of named items), and
    /// of a switch's selected branch with the discriminant spliced in.
    Object(Vec<(Box<str>, Value)>),
    /// A user label produced by a fixed conversion or a switch id remap, or
    /// produced by a custom conversion's `to` function. Not produced by any
    /// built-in item on its own — this is the "arbitrary label" the base
    /// spec mentions for fixed conversions and remapped switch ids.
    Label(Box<str>),
}

impl Value {
    /// Constructs an [`Value::Int`] from any value that fits in an `i128`,
    /// for tests and call sites that don't need the full 256-bit range.
    pub fn int(v: impl Into<I256>) -> Value {
        Value::Int(v.into())
    }

    /// Constructs a [`Value::UInt`] from any value that fits in a `u128`.
    pub fn uint(v: impl Into<U256>) -> Value {
        Value::UInt(v.into())
    }

    /// Looks up a field by name in an [`Value::Object`]; `None` if `self`
    /// isn't an object or has no such field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.iter().find(|(n, _)| &**n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Builds an object value from an iterator of `(name, value)` pairs,
    /// preserving iteration order.
    pub fn object<I, N>(fields: I) -> Value
    where
        I: IntoIterator<Item = (N, Value)>,
        N: Into<Box<str>>,
    {
        Value::Object(fields.into_iter().map(|(n, v)| (n.into(), v)).collect())
    }
}
