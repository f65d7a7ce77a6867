//! The serialize engine: writes a value through a [`Cursor`] into a buffer.
//!
//! `serialize` always runs the size engine first — once, with its
//! conversion cache enabled — to learn the exact output size and to capture
//! every `custom.from(data)` result so this pass never calls a user
//! conversion function twice (see [`crate::size`]'s module docs).

use ethnum::U256;

use crate::cursor::Cursor;
use crate::error::Error;
use crate::item::{
    ArrayItem, ArrayShape, BytesItem, BytesShape, Conversion, Item, Layout, NumericItem, ProperLayout, SwitchItem,
};
use crate::numeric::{check_int_range, check_uint_range, encode_int, encode_uint};
use crate::size::{calc_size, ConversionCache};
use crate::util::{check_bytes_equal, check_item_size, check_num_equals, check_size, find_id_layout_pair, signed_as_uint};
use crate::value::Value;

/// Serializes `data` under `layout`, allocating a buffer of exactly the
/// computed size.
#[tracing::instrument(level = "trace", skip_all)]
pub fn serialize(layout: &Layout, data: &Value) -> Result<Vec<u8>, Error> {
    let mut cache = ConversionCache::new();
    let size = calc_size(layout, data, &mut cache)?;
    let mut buffer = vec![0u8; size];
    let mut cursor = Cursor::new(&mut buffer);
    write_layout(layout, data, &mut cursor, &mut cache)?;
    if cursor.offset != size {
        return Err(Error::UnderWrite {
            computed: size,
            written: cursor.offset,
        });
    }
    Ok(buffer)
}

/// Serializes `data` under `layout` into a caller-supplied buffer, starting
/// at offset 0. The buffer may be larger than required; returns the number
/// of bytes actually written.
#[tracing::instrument(level = "trace", skip_all)]
pub fn serialize_into(layout: &Layout, data: &Value, buffer: &mut [u8]) -> Result<usize, Error> {
    let mut cache = ConversionCache::new();
    calc_size(layout, data, &mut cache)?;
    let mut cursor = Cursor::new(buffer);
    write_layout(layout, data, &mut cursor, &mut cache)?;
    Ok(cursor.offset)
}

fn write_layout(layout: &Layout, data: &Value, cursor: &mut Cursor, cache: &mut ConversionCache) -> Result<(), Error> {
    match layout {
        Layout::Item(item) => write_item_required(item, data, cursor, cache),
        Layout::Proper(proper) => write_proper(proper, data, cursor, cache),
    }
}

fn write_proper(
    proper: &ProperLayout,
    data: &Value,
    cursor: &mut Cursor,
    cache: &mut ConversionCache,
) -> Result<(), Error> {
    for named in &proper.items {
        let field = data.field(&named.name);
        write_item_optional(&named.item, field, &named.name, cursor, cache)
            .map_err(|e| e.in_field(named.name.clone()))?;
    }
    Ok(())
}

fn write_item_required(item: &Item, data: &Value, cursor: &mut Cursor, cache: &mut ConversionCache) -> Result<(), Error> {
    match item {
        Item::Int(n) => write_numeric(n, true, Some(data), "<item>", cursor),
        Item::UInt(n) => write_numeric(n, false, Some(data), "<item>", cursor),
        Item::Bytes(b) => write_bytes(b, Some(data), "<item>", cursor, cache),
        Item::Array(a) => write_array(a, data, cursor, cache),
        Item::Switch(s) => write_switch(s, data, cursor, cache),
    }
}

fn write_item_optional(
    item: &Item,
    data: Option<&Value>,
    name: &str,
    cursor: &mut Cursor,
    cache: &mut ConversionCache,
) -> Result<(), Error> {
    match item {
        Item::Int(n) => write_numeric(n, true, data, name, cursor),
        Item::UInt(n) => write_numeric(n, false, data, name, cursor),
        Item::Bytes(b) => write_bytes(b, data, name, cursor, cache),
        Item::Array(a) => {
            let d = data.ok_or_else(|| Error::UnknownField(name.into()))?;
            write_array(a, d, cursor, cache)
        }
        Item::Switch(s) => {
            let d = data.ok_or_else(|| Error::UnknownField(name.into()))?;
            write_switch(s, d, cursor, cache)
        }
    }
}

fn write_numeric(
    n: &NumericItem,
    signed: bool,
    data: Option<&Value>,
    name: &str,
    cursor: &mut Cursor,
) -> Result<(), Error> {
    let effective = match &n.custom {
        Some(Conversion::Constant { value, omit }) => {
            if !omit {
                if let Some(d) = data {
                    check_num_equals(value, d)?;
                }
            }
            value.clone()
        }
        Some(Conversion::Fixed { from, .. }) => from.clone(),
        Some(Conversion::Custom(conv)) => {
            let d = data.ok_or_else(|| Error::UnknownField(name.into()))?;
            conv.from(d)?
        }
        None => data.cloned().ok_or_else(|| Error::UnknownField(name.into()))?,
    };

    if signed {
        let v = numeric_as_int(&effective, n.size)?;
        check_int_range(v, n.size)?;
        cursor.put(&encode_int(v, n.size, n.endianness));
    } else {
        let v = numeric_as_uint(&effective, n.size)?;
        check_uint_range(v, n.size)?;
        cursor.put(&encode_uint(v, n.size, n.endianness));
    }
    Ok(())
}

fn numeric_as_int(v: &Value, size: u8) -> Result<ethnum::I256, Error> {
    match v {
        Value::Int(i) => Ok(*i),
        Value::UInt(u) => crate::util::unsigned_as_signed(*u).ok_or(Error::OutOfRange { size, kind: "signed integer" }),
        _ => Err(Error::OutOfRange { size, kind: "signed integer" }),
    }
}

fn numeric_as_uint(v: &Value, size: u8) -> Result<U256, Error> {
    match v {
        Value::UInt(u) => Ok(*u),
        Value::Int(i) => signed_as_uint(*i).ok_or(Error::OutOfRange { size, kind: "unsigned integer" }),
        _ => Err(Error::OutOfRange { size, kind: "unsigned integer" }),
    }
}

fn write_bytes(
    b: &BytesItem,
    data: Option<&Value>,
    name: &str,
    cursor: &mut Cursor,
    cache: &mut ConversionCache,
) -> Result<(), Error> {
    let prefix_len = b.shape.prefix_len();
    let length_at = (prefix_len > 0).then(|| cursor.reserve(prefix_len));
    let payload_start = cursor.offset;

    if let Some(nested) = &b.layout {
        let nested_data = resolve_nested_data(b, data, name, cache)?;
        write_layout(nested, &nested_data, cursor, cache)?;
    } else {
        let payload = resolve_payload(b, data, name, cache)?;
        cursor.put(&payload);
        let declared = match &b.shape {
            BytesShape::Fixed { size } => Some(*size),
            _ => None,
        };
        check_item_size(declared, payload.len())?;
    }

    let payload_len = cursor.offset - payload_start;
    if let (Some(at), BytesShape::Prefixed { length_size, length_endianness }) = (length_at, &b.shape) {
        let len_bytes = encode_uint(U256::from(payload_len as u64), *length_size, *length_endianness);
        cursor.patch(at, &len_bytes);
    }
    Ok(())
}

/// Resolves the value fed into a nested layout. Mirrors [`crate::size`]'s
/// `bytes_data_size` exactly so cache entries line up, but pops from the
/// cache instead of recomputing for the `Custom` case.
fn resolve_nested_data(
    b: &BytesItem,
    data: Option<&Value>,
    name: &str,
    cache: &mut ConversionCache,
) -> Result<Value, Error> {
    match &b.custom {
        None => data.cloned().ok_or_else(|| Error::UnknownField(name.into())),
        Some(Conversion::Fixed { from, .. }) => Ok(from.clone()),
        Some(Conversion::Constant { value, .. }) => Ok(value.clone()),
        Some(Conversion::Custom(_)) => Ok(cache.pop()),
    }
}

fn resolve_payload(
    b: &BytesItem,
    data: Option<&Value>,
    name: &str,
    cache: &mut ConversionCache,
) -> Result<Vec<u8>, Error> {
    match &b.custom {
        Some(Conversion::Constant { value, omit }) => {
            if !omit {
                if let Some(d) = data {
                    check_bytes_value_equals(value, d)?;
                }
            }
            expect_bytes_owned(value)
        }
        Some(Conversion::Fixed { from, .. }) => expect_bytes_owned(from),
        Some(Conversion::Custom(_)) => expect_bytes_owned(&cache.pop()),
        None => {
            let d = data.ok_or_else(|| Error::UnknownField(name.into()))?;
            expect_bytes_owned(d)
        }
    }
}

fn check_bytes_value_equals(constant: &Value, observed: &Value) -> Result<(), Error> {
    let c = expect_bytes_ref(constant)?;
    let o = expect_bytes_ref(observed)?;
    check_bytes_equal(c, o, None, None)
}

fn expect_bytes_ref(v: &Value) -> Result<&[u8], Error> {
    v.as_bytes()
        .map(|b| b.as_slice())
        .ok_or_else(|| Error::IncompleteData("expected a bytes value".into()))
}

fn expect_bytes_owned(v: &Value) -> Result<Vec<u8>, Error> {
    expect_bytes_ref(v).map(|s| s.to_vec())
}

fn write_array(a: &ArrayItem, data: &Value, cursor: &mut Cursor, cache: &mut ConversionCache) -> Result<(), Error> {
    let elems = data
        .as_array()
        .ok_or_else(|| Error::IncompleteData("expected an array value".into()))?;
    match &a.shape {
        ArrayShape::Fixed { length } => check_size(*length, elems.len())?,
        ArrayShape::Prefixed { length_size, length_endianness } => {
            let len_bytes = encode_uint(U256::from(elems.len() as u64), *length_size, *length_endianness);
            cursor.put(&len_bytes);
        }
        ArrayShape::Boundless => {}
    }
    for e in elems {
        write_layout(&a.element, e, cursor, cache)?;
    }
    Ok(())
}

fn write_switch(s: &SwitchItem, data: &Value, cursor: &mut Cursor, cache: &mut ConversionCache) -> Result<(), Error> {
    let branch = find_id_layout_pair(s, data)?;
    let id_bytes = encode_uint(U256::from(branch.id.wire()), s.id_size, s.id_endianness);
    cursor.put(&id_bytes);
    write_proper(&branch.layout, data, cursor, cache)
}
