//! The size engine: static and data-driven size computation.
//!
//! [`calc_static_size`] answers "is this layout's size fully determined
//! without a value?"; [`calc_size`] answers "how many bytes does *this*
//! value serialize to?" and, along the way, threads a [`ConversionCache`]
//! through every `bytes` item with a [`Conversion::Custom`] so the serialize
//! engine can reuse the already-computed conversion instead of calling the
//! user's `from` function a second time. The two passes must visit items in
//! identical order for that handoff to line up — this constraint is load
//! bearing (see the base spec's design notes on the conversion cache queue).

use std::borrow::Cow;
use std::collections::VecDeque;

use crate::error::Error;
use crate::item::{ArrayItem, ArrayShape, BytesItem, Conversion, Item, Layout, ProperLayout, SwitchItem};
use crate::util::find_id_layout_pair;
use crate::value::Value;

/// A FIFO queue of `custom.from(data)` results, populated by [`calc_size`]
/// and drained by the serialize engine in the same traversal order.
#[derive(Default)]
pub struct ConversionCache {
    queue: VecDeque<Value>,
}

impl ConversionCache {
    pub fn new() -> ConversionCache {
        ConversionCache::default()
    }

    fn push(&mut self, value: Value) {
        self.queue.push_back(value);
    }

    /// Pops the next cached conversion result. Panics if the serialize
    /// engine's traversal order has drifted from the size engine's — that
    /// would be a bug in this crate, not a user error.
    pub fn pop(&mut self) -> Value {
        self.queue
            .pop_front()
            .expect("conversion cache desynchronized between size and serialize passes")
    }
}

/// Returns the layout's size in bytes if it is fully determined without a
/// value, `None` ("unknown") otherwise.
pub fn calc_static_size(layout: &Layout) -> Option<usize> {
    match layout {
        Layout::Item(item) => item_static_size(item),
        Layout::Proper(proper) => proper_static_size(proper),
    }
}

fn proper_static_size(proper: &ProperLayout) -> Option<usize> {
    let mut total = 0;
    for named in &proper.items {
        total += item_static_size(&named.item)?;
    }
    Some(total)
}

fn item_static_size(item: &Item) -> Option<usize> {
    match item {
        Item::Int(n) | Item::UInt(n) => Some(n.size as usize),
        Item::Bytes(b) => bytes_static_size(b),
        Item::Array(a) => array_static_size(a),
        Item::Switch(s) => switch_static_size(s),
    }
}

fn bytes_static_size(b: &BytesItem) -> Option<usize> {
    let prefix = b.shape.prefix_len();
    if let Some(nested) = &b.layout {
        return calc_static_size(nested).map(|n| prefix + n);
    }
    match &b.custom {
        Some(Conversion::Constant { value, .. }) => value.as_bytes().map(|v| prefix + v.len()),
        Some(Conversion::Fixed { from, .. }) => from.as_bytes().map(|v| prefix + v.len()),
        Some(Conversion::Custom(_)) => None,
        None => match &b.shape {
            crate::item::BytesShape::Fixed { size } => Some(*size),
            _ => None,
        },
    }
}

fn array_static_size(a: &ArrayItem) -> Option<usize> {
    match &a.shape {
        ArrayShape::Fixed { length } => calc_static_size(&a.element).map(|s| length * s),
        ArrayShape::Prefixed { .. } | ArrayShape::Boundless => None,
    }
}

fn switch_static_size(s: &SwitchItem) -> Option<usize> {
    let mut common = None;
    for branch in &s.branches {
        let sz = proper_static_size(&branch.layout)?;
        match common {
            None => common = Some(sz),
            Some(c) if c == sz => {}
            _ => return None,
        }
    }
    common.map(|c| s.id_size as usize + c)
}

/// Returns the exact byte count `value` will serialize to under `layout`,
/// populating `cache` with every `custom.from` result seen along the way.
pub fn calc_size(layout: &Layout, data: &Value, cache: &mut ConversionCache) -> Result<usize, Error> {
    match layout {
        Layout::Item(item) => item_data_size_required(item, data, cache),
        Layout::Proper(proper) => proper_data_size(proper, data, cache),
    }
}

fn proper_data_size(proper: &ProperLayout, data: &Value, cache: &mut ConversionCache) -> Result<usize, Error> {
    let mut total = 0;
    for named in &proper.items {
        let field = data.field(&named.name);
        total += item_data_size_optional(&named.item, field, &named.name, cache)
            .map_err(|e| e.in_field(named.name.clone()))?;
    }
    Ok(total)
}

fn item_data_size_required(item: &Item, data: &Value, cache: &mut ConversionCache) -> Result<usize, Error> {
    match item {
        Item::Int(n) | Item::UInt(n) => Ok(n.size as usize),
        Item::Bytes(b) => bytes_data_size(b, Some(data), "<item>", cache),
        Item::Array(a) => array_data_size(a, data, cache),
        Item::Switch(s) => switch_data_size(s, data, cache),
    }
}

fn item_data_size_optional(
    item: &Item,
    data: Option<&Value>,
    name: &str,
    cache: &mut ConversionCache,
) -> Result<usize, Error> {
    match item {
        Item::Int(n) | Item::UInt(n) => Ok(n.size as usize),
        Item::Bytes(b) => bytes_data_size(b, data, name, cache),
        Item::Array(a) => {
            let d = data.ok_or_else(|| Error::UnknownField(name.into()))?;
            array_data_size(a, d, cache)
        }
        Item::Switch(s) => {
            let d = data.ok_or_else(|| Error::UnknownField(name.into()))?;
            switch_data_size(s, d, cache)
        }
    }
}

fn bytes_data_size(b: &BytesItem, data: Option<&Value>, name: &str, cache: &mut ConversionCache) -> Result<usize, Error> {
    let prefix = b.shape.prefix_len();
    if let Some(nested) = &b.layout {
        let nested_data: Cow<Value> = match &b.custom {
            None => Cow::Borrowed(data.ok_or_else(|| Error::UnknownField(name.into()))?),
            Some(Conversion::Fixed { from, .. }) => Cow::Borrowed(from),
            Some(Conversion::Constant { value, .. }) => Cow::Borrowed(value),
            Some(Conversion::Custom(conv)) => {
                let d = data.ok_or_else(|| Error::UnknownField(name.into()))?;
                let v = conv.from(d)?;
                cache.push(v.clone());
                Cow::Owned(v)
            }
        };
        return Ok(prefix + calc_size(nested, &nested_data, cache)?);
    }
    match &b.custom {
        Some(Conversion::Constant { value, .. }) => Ok(prefix + expect_bytes(value)?.len()),
        Some(Conversion::Fixed { from, .. }) => Ok(prefix + expect_bytes(from)?.len()),
        Some(Conversion::Custom(conv)) => {
            let d = data.ok_or_else(|| Error::UnknownField(name.into()))?;
            let v = conv.from(d)?;
            let len = expect_bytes(&v)?.len();
            cache.push(v);
            Ok(prefix + len)
        }
        None => {
            let d = data.ok_or_else(|| Error::UnknownField(name.into()))?;
            Ok(prefix + expect_bytes(d)?.len())
        }
    }
}

fn array_data_size(a: &ArrayItem, data: &Value, cache: &mut ConversionCache) -> Result<usize, Error> {
    let elems = data
        .as_array()
        .ok_or_else(|| Error::IncompleteData("expected an array value".into()))?;
    let mut total = a.shape.prefix_len();
    for e in elems {
        total += calc_size(&a.element, e, cache)?;
    }
    Ok(total)
}

fn switch_data_size(s: &SwitchItem, data: &Value, cache: &mut ConversionCache) -> Result<usize, Error> {
    let branch = find_id_layout_pair(s, data)?;
    Ok(s.id_size as usize + proper_data_size(&branch.layout, data, cache)?)
}

fn expect_bytes(v: &Value) -> Result<&[u8], Error> {
    v.as_bytes()
        .map(|b| b.as_slice())
        .ok_or_else(|| Error::IncompleteData("expected a bytes value".into()))
}
