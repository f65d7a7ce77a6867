//! A declarative binary codec: describe the byte-level shape of a message as
//! a [`Layout`] value, then get three services mechanically derived from
//! that description — [`serialize`]/[`serialize_into`] (value → bytes),
//! [`deserialize`]/[`deserialize_partial`] (bytes → value), and
//! [`build_discriminator`] (bytes → index of the matching layout in a fixed
//! set). The layout is an ordinary, immutable data structure built with
//! plain constructors; there is no macro or code-generation step in this
//! core (a `#[derive]`-based typed façade, mirroring how `spacetimedb-sats`
//! layers `#[derive(SpacetimeType)]` over its untyped `AlgebraicValue`/
//! `AlgebraicType` core, is a natural companion but is not built here — see
//! `DESIGN.md`).
//!
//! No schema evolution/versioning, no streaming decode across multiple
//! buffers, no floating-point primitives, no async I/O, and no
//! self-describing mode: every decode needs the original [`Layout`].

mod cursor;
mod numeric;

pub mod discriminator;
pub mod endian;
pub mod error;
pub mod item;
pub mod size;
pub mod split;
pub mod util;
pub mod value;

mod de;
mod ser;

pub use de::{deserialize, deserialize_partial};
pub use discriminator::{build_discriminator, DecisionNode, Discriminator, SizeTest};
pub use endian::set_endianness;
pub use error::Error;
pub use item::{
    ArrayItem, ArrayShape, BytesItem, BytesShape, Conversion, CustomConversion, Endianness, Item, Layout, NamedItem,
    NumericItem, ProperLayout, SwitchBranch, SwitchId, SwitchItem,
};
pub use ser::{serialize, serialize_into};
pub use size::{calc_size, calc_static_size, ConversionCache};
pub use split::{add_fixed_values, dynamic_items_of, fixed_items_of};
pub use value::Value;

#[cfg(test)]
mod tests;

#[cfg(test)]
mod proptests;
