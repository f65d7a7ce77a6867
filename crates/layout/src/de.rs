//! The deserialize engine: reads a value through a [`Chunk`] out of a buffer.
//!
//! Mirrors [`crate::ser`]'s structure item-for-item, in the same traversal
//! order, but reading instead of writing: numeric items decode then apply a
//! conversion's `to`, bytes items with a nested layout carve a bounded
//! sub-chunk before recursing, arrays consume either a fixed count, a
//! decoded count, or everything left, and switches read a wire id before
//! picking which branch's layout to recurse into.

use ethnum::U256;

use crate::cursor::Chunk;
use crate::error::Error;
use crate::item::{ArrayItem, ArrayShape, BytesItem, BytesShape, Conversion, Item, Layout, NumericItem, ProperLayout, SwitchItem};
use crate::numeric::{decode_int, decode_uint};
use crate::util::{check_bytes_equal, check_num_equals, u256_to_u64, u256_to_usize};
use crate::value::Value;

/// Decodes `bytes` under `layout`. Fails with [`Error::ExcessBytes`] if
/// anything is left over once the layout has been fully read.
#[tracing::instrument(level = "trace", skip_all)]
pub fn deserialize(layout: &Layout, bytes: &[u8]) -> Result<Value, Error> {
    let mut chunk = Chunk::new(bytes);
    let value = read_layout(layout, &mut chunk)?;
    if chunk.remaining() > 0 {
        return Err(Error::ExcessBytes { extra: chunk.remaining() });
    }
    Ok(value)
}

/// Decodes a `layout`-shaped value from the front of `bytes`, returning it
/// alongside the number of bytes consumed. Unlike [`deserialize`], leftover
/// bytes are not an error — useful for streams and framed protocols where a
/// single buffer holds more than one message.
#[tracing::instrument(level = "trace", skip_all)]
pub fn deserialize_partial(layout: &Layout, bytes: &[u8]) -> Result<(Value, usize), Error> {
    let mut chunk = Chunk::new(bytes);
    let value = read_layout(layout, &mut chunk)?;
    Ok((value, chunk.offset))
}

fn read_layout(layout: &Layout, chunk: &mut Chunk) -> Result<Value, Error> {
    match layout {
        Layout::Item(item) => read_item_required(item, chunk),
        Layout::Proper(proper) => read_proper(proper, chunk),
    }
}

fn read_proper(proper: &ProperLayout, chunk: &mut Chunk) -> Result<Value, Error> {
    Ok(Value::Object(read_proper_fields(proper, chunk)?))
}

fn read_proper_fields(proper: &ProperLayout, chunk: &mut Chunk) -> Result<Vec<(Box<str>, Value)>, Error> {
    let mut fields = Vec::with_capacity(proper.items.len());
    for named in &proper.items {
        let decoded = read_item_optional(&named.item, chunk).map_err(|e| e.in_field(named.name.clone()))?;
        if let Some(v) = decoded {
            fields.push((named.name.clone(), v));
        }
    }
    Ok(fields)
}

fn read_item_required(item: &Item, chunk: &mut Chunk) -> Result<Value, Error> {
    match item {
        Item::Int(n) => read_numeric(n, true, chunk)?
            .ok_or_else(|| Error::MalformedLayout("a top-level numeric item cannot omit its value".into())),
        Item::UInt(n) => read_numeric(n, false, chunk)?
            .ok_or_else(|| Error::MalformedLayout("a top-level numeric item cannot omit its value".into())),
        Item::Bytes(b) => read_bytes(b, chunk)?
            .ok_or_else(|| Error::MalformedLayout("a top-level bytes item cannot omit its value".into())),
        Item::Array(a) => read_array(a, chunk),
        Item::Switch(s) => read_switch(s, chunk),
    }
}

fn read_item_optional(item: &Item, chunk: &mut Chunk) -> Result<Option<Value>, Error> {
    match item {
        Item::Int(n) => read_numeric(n, true, chunk),
        Item::UInt(n) => read_numeric(n, false, chunk),
        Item::Bytes(b) => read_bytes(b, chunk),
        Item::Array(a) => read_array(a, chunk).map(Some),
        Item::Switch(s) => read_switch(s, chunk).map(Some),
    }
}

fn read_numeric(n: &NumericItem, signed: bool, chunk: &mut Chunk) -> Result<Option<Value>, Error> {
    let bytes = chunk.advance(n.size as usize)?;
    let wire = if signed {
        Value::Int(decode_int(bytes, n.endianness))
    } else {
        Value::UInt(decode_uint(bytes, n.endianness))
    };
    match &n.custom {
        Some(Conversion::Constant { value, omit }) => {
            check_num_equals(value, &wire)?;
            Ok((!*omit).then(|| value.clone()))
        }
        Some(Conversion::Fixed { from, to }) => {
            check_num_equals(from, &wire)?;
            Ok(Some(to.clone()))
        }
        Some(Conversion::Custom(conv)) => Ok(Some(conv.to(&wire)?)),
        None => Ok(Some(wire)),
    }
}

fn read_bytes(b: &BytesItem, chunk: &mut Chunk) -> Result<Option<Value>, Error> {
    let payload_len = bytes_payload_len(b, chunk)?;

    match (&b.layout, &b.custom) {
        (Some(nested), None) => {
            let mut sub = chunk.sub_chunk(payload_len)?;
            let decoded = read_layout(nested, &mut sub)?;
            check_fully_consumed(&sub)?;
            chunk.advance(payload_len)?;
            Ok(Some(decoded))
        }
        (Some(nested), Some(Conversion::Custom(conv))) => {
            let mut sub = chunk.sub_chunk(payload_len)?;
            let decoded = read_layout(nested, &mut sub)?;
            check_fully_consumed(&sub)?;
            chunk.advance(payload_len)?;
            Ok(Some(conv.to(&decoded)?))
        }
        (Some(nested), Some(Conversion::Fixed { from, to })) => {
            let payload = chunk.advance(payload_len)?;
            let cached = fixed_wire_bytes(b, nested, from)?;
            check_bytes_equal(cached, payload, None, None)?;
            Ok(Some(to.clone()))
        }
        (Some(_), Some(Conversion::Constant { value, omit })) => {
            let payload = chunk.advance(payload_len)?;
            check_bytes_value_equals(value, payload)?;
            Ok((!*omit).then(|| value.clone()))
        }
        (None, custom) => {
            let payload = chunk.advance(payload_len)?.to_vec();
            finish_plain_bytes(custom, payload)
        }
    }
}

fn bytes_payload_len(b: &BytesItem, chunk: &mut Chunk) -> Result<usize, Error> {
    match &b.shape {
        BytesShape::Fixed { size } => Ok(*size),
        BytesShape::Prefixed { length_size, length_endianness } => {
            let len_bytes = chunk.advance(*length_size as usize)?;
            let raw = decode_uint(len_bytes, *length_endianness);
            u256_to_usize(raw).ok_or(Error::OutOfRange { size: *length_size, kind: "length prefix" })
        }
        BytesShape::Boundless => Ok(chunk.remaining()),
    }
}

fn check_fully_consumed(chunk: &Chunk) -> Result<(), Error> {
    if chunk.remaining() > 0 {
        Err(Error::ExcessBytes { extra: chunk.remaining() })
    } else {
        Ok(())
    }
}

/// Serializes `from` through `nested` exactly once, caching the wire bytes
/// on the item for every later decode that needs to compare against them.
fn fixed_wire_bytes<'a>(b: &'a BytesItem, nested: &Layout, from: &Value) -> Result<&'a [u8], Error> {
    b.fixed_cache
        .get_or_try_init(|| crate::ser::serialize(nested, from))
        .map(|v| v.as_slice())
}

fn finish_plain_bytes(custom: &Option<Conversion>, payload: Vec<u8>) -> Result<Option<Value>, Error> {
    match custom {
        Some(Conversion::Constant { value, omit }) => {
            check_bytes_value_equals(value, &payload)?;
            Ok((!*omit).then(|| value.clone()))
        }
        Some(Conversion::Fixed { from, to }) => {
            check_bytes_value_equals(from, &payload)?;
            Ok(Some(to.clone()))
        }
        Some(Conversion::Custom(conv)) => Ok(Some(conv.to(&Value::Bytes(payload))?)),
        None => Ok(Some(Value::Bytes(payload))),
    }
}

fn check_bytes_value_equals(constant: &Value, observed: &[u8]) -> Result<(), Error> {
    let expected = constant
        .as_bytes()
        .map(|b| b.as_slice())
        .ok_or_else(|| Error::IncompleteData("expected a bytes value".into()))?;
    check_bytes_equal(expected, observed, None, None)
}

fn read_array(a: &ArrayItem, chunk: &mut Chunk) -> Result<Value, Error> {
    let mut elems = Vec::new();
    match &a.shape {
        ArrayShape::Fixed { length } => {
            for _ in 0..*length {
                elems.push(read_layout(&a.element, chunk)?);
            }
        }
        ArrayShape::Prefixed { length_size, length_endianness } => {
            let len_bytes = chunk.advance(*length_size as usize)?;
            let raw = decode_uint(len_bytes, *length_endianness);
            let count = u256_to_usize(raw).ok_or(Error::OutOfRange { size: *length_size, kind: "length prefix" })?;
            elems.reserve(count);
            for _ in 0..count {
                elems.push(read_layout(&a.element, chunk)?);
            }
        }
        ArrayShape::Boundless => {
            while chunk.remaining() > 0 {
                elems.push(read_layout(&a.element, chunk)?);
            }
        }
    }
    Ok(Value::Array(elems))
}

fn read_switch(s: &SwitchItem, chunk: &mut Chunk) -> Result<Value, Error> {
    let id_bytes = chunk.advance(s.id_size as usize)?;
    let raw: U256 = decode_uint(id_bytes, s.id_endianness);
    let wire_id = u256_to_u64(raw).ok_or(Error::OutOfRange { size: s.id_size, kind: "switch id" })?;
    let branch = s.branch_for_wire(wire_id).ok_or(Error::UnknownSwitchId(wire_id))?;
    let mut fields = read_proper_fields(&branch.layout, chunk)?;
    fields.push((s.id_tag.clone(), branch.id.decoded()));
    Ok(Value::Object(fields))
}
