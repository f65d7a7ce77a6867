//! Fixed/dynamic partitioning: splitting a layout into the part whose
//! values are already pinned down by the layout itself (constants, fixed
//! conversions, fixed-length containers of those) and the part that still
//! needs caller-supplied data, plus the inverse operation that rehydrates a
//! full value from just the dynamic half.
//!
//! A sub-layout that contributes nothing to a given half "vanishes" —
//! dropped from its enclosing proper layout, array element, or switch
//! branch list — rather than being represented as some empty placeholder
//! item.

use crate::error::Error;
use crate::item::{
    ArrayItem, ArrayShape, BytesItem, Conversion, Item, Layout, NamedItem, ProperLayout, SwitchBranch, SwitchItem,
};
use crate::value::Value;

/// The sub-layout of `layout` whose values are fully determined without
/// external data: constants, fixed conversions, and containers built purely
/// out of those.
pub fn fixed_items_of(layout: &Layout) -> Layout {
    split_layout(layout, true)
}

/// The complement of [`fixed_items_of`]: everything that still needs
/// caller-supplied data to serialize.
pub fn dynamic_items_of(layout: &Layout) -> Layout {
    split_layout(layout, false)
}

fn split_layout(layout: &Layout, want_fixed: bool) -> Layout {
    match layout {
        Layout::Item(item) => split_item(item, want_fixed)
            .map(|it| Layout::Item(Box::new(it)))
            .unwrap_or_else(empty_layout),
        Layout::Proper(proper) => Layout::Proper(split_proper(proper, want_fixed)),
    }
}

fn split_proper(proper: &ProperLayout, want_fixed: bool) -> ProperLayout {
    ProperLayout {
        items: proper
            .items
            .iter()
            .filter_map(|named| {
                split_item(&named.item, want_fixed).map(|item| NamedItem {
                    name: named.name.clone(),
                    item,
                })
            })
            .collect(),
    }
}

fn split_item(item: &Item, want_fixed: bool) -> Option<Item> {
    match item {
        Item::Int(n) | Item::UInt(n) => {
            let is_fixed = matches!(n.custom, Some(Conversion::Constant { .. }) | Some(Conversion::Fixed { .. }));
            (is_fixed == want_fixed).then(|| item.clone())
        }
        Item::Bytes(b) => split_bytes(b, want_fixed).map(Item::Bytes),
        Item::Array(a) => split_array(a, want_fixed).map(Item::Array),
        Item::Switch(s) => split_switch(s, want_fixed).map(Item::Switch),
    }
}

fn split_bytes(b: &BytesItem, want_fixed: bool) -> Option<BytesItem> {
    match &b.custom {
        Some(Conversion::Constant { .. }) | Some(Conversion::Fixed { .. }) => want_fixed.then(|| b.clone()),
        Some(Conversion::Custom(_)) => (!want_fixed).then(|| b.clone()),
        None => match &b.layout {
            Some(nested) => {
                let split = split_layout(nested, want_fixed);
                (!is_empty_layout(&split)).then(|| BytesItem {
                    shape: b.shape.clone(),
                    layout: Some(Box::new(split)),
                    custom: None,
                    fixed_cache: once_cell::sync::OnceCell::new(),
                })
            }
            None => (!want_fixed).then(|| b.clone()),
        },
    }
}

fn split_array(a: &ArrayItem, want_fixed: bool) -> Option<ArrayItem> {
    match &a.shape {
        ArrayShape::Fixed { length } => {
            let split = split_layout(&a.element, want_fixed);
            (!is_empty_layout(&split)).then(|| ArrayItem {
                shape: ArrayShape::Fixed { length: *length },
                element: Box::new(split),
            })
        }
        ArrayShape::Prefixed { .. } | ArrayShape::Boundless => (!want_fixed).then(|| a.clone()),
    }
}

fn split_switch(s: &SwitchItem, want_fixed: bool) -> Option<SwitchItem> {
    let branches: Vec<SwitchBranch> = s
        .branches
        .iter()
        .filter_map(|branch| {
            let layout = split_proper(&branch.layout, want_fixed);
            (!layout.items.is_empty()).then(|| SwitchBranch {
                id: branch.id.clone(),
                layout,
            })
        })
        .collect();
    (!branches.is_empty()).then(|| SwitchItem {
        id_size: s.id_size,
        id_endianness: s.id_endianness,
        id_tag: s.id_tag.clone(),
        branches,
    })
}

fn is_empty_layout(layout: &Layout) -> bool {
    matches!(layout, Layout::Proper(p) if p.items.is_empty())
}

fn empty_layout() -> Layout {
    Layout::Proper(ProperLayout { items: Vec::new() })
}

/// Rehydrates a full value from just its dynamic half: walks `layout`,
/// emitting the fixed value at every fixed position and copying from
/// `dynamic` (by name) at every dynamic one.
pub fn add_fixed_values(layout: &Layout, dynamic: &Value) -> Result<Value, Error> {
    match layout {
        Layout::Item(item) => hydrate_item(item, Some(dynamic), "<item>")?
            .ok_or_else(|| Error::MalformedLayout("a top-level item cannot omit its value".into())),
        Layout::Proper(proper) => Ok(Value::Object(add_fixed_proper(proper, dynamic)?)),
    }
}

fn add_fixed_proper(proper: &ProperLayout, dynamic_parent: &Value) -> Result<Vec<(Box<str>, Value)>, Error> {
    let mut out = Vec::with_capacity(proper.items.len());
    for named in &proper.items {
        let field_dynamic = dynamic_parent.field(&named.name);
        let value = hydrate_item(&named.item, field_dynamic, &named.name).map_err(|e| e.in_field(named.name.clone()))?;
        if let Some(v) = value {
            out.push((named.name.clone(), v));
        }
    }
    Ok(out)
}

fn hydrate_item(item: &Item, dynamic: Option<&Value>, name: &str) -> Result<Option<Value>, Error> {
    match item {
        Item::Int(n) | Item::UInt(n) => match &n.custom {
            Some(Conversion::Constant { value, omit }) => Ok((!*omit).then(|| value.clone())),
            Some(Conversion::Fixed { to, .. }) => Ok(Some(to.clone())),
            Some(Conversion::Custom(_)) | None => {
                Ok(Some(dynamic.ok_or_else(|| Error::UnknownField(name.into()))?.clone()))
            }
        },
        Item::Bytes(b) => hydrate_bytes(b, dynamic, name),
        Item::Array(a) => hydrate_array(a, dynamic, name).map(Some),
        Item::Switch(s) => hydrate_switch(s, dynamic, name).map(Some),
    }
}

fn hydrate_bytes(b: &BytesItem, dynamic: Option<&Value>, name: &str) -> Result<Option<Value>, Error> {
    match &b.custom {
        Some(Conversion::Constant { value, omit }) => Ok((!*omit).then(|| value.clone())),
        Some(Conversion::Fixed { to, .. }) => Ok(Some(to.clone())),
        Some(Conversion::Custom(_)) => Ok(Some(dynamic.ok_or_else(|| Error::UnknownField(name.into()))?.clone())),
        None => match &b.layout {
            Some(nested) => {
                let nested_dynamic = dynamic.cloned().unwrap_or_else(|| Value::Object(Vec::new()));
                Ok(Some(add_fixed_values(nested, &nested_dynamic)?))
            }
            None => Ok(Some(dynamic.ok_or_else(|| Error::UnknownField(name.into()))?.clone())),
        },
    }
}

fn hydrate_array(a: &ArrayItem, dynamic: Option<&Value>, name: &str) -> Result<Value, Error> {
    match &a.shape {
        ArrayShape::Fixed { length } => {
            let dyn_elems = match dynamic {
                Some(Value::Array(arr)) => arr.clone(),
                Some(_) => return Err(Error::MalformedLayout("expected an array value".into())),
                None => Vec::new(),
            };
            let mut out = Vec::with_capacity(*length);
            for i in 0..*length {
                let elem_dynamic = dyn_elems.get(i).cloned().unwrap_or_else(|| Value::Object(Vec::new()));
                out.push(add_fixed_values(&a.element, &elem_dynamic)?);
            }
            Ok(Value::Array(out))
        }
        ArrayShape::Prefixed { .. } | ArrayShape::Boundless => {
            Ok(dynamic.ok_or_else(|| Error::UnknownField(name.into()))?.clone())
        }
    }
}

fn hydrate_switch(s: &SwitchItem, dynamic: Option<&Value>, name: &str) -> Result<Value, Error> {
    let d = dynamic.ok_or_else(|| Error::UnknownField(name.into()))?;
    let tag_value = d.field(&s.id_tag).ok_or_else(|| Error::UnknownField(s.id_tag.clone()))?;
    let branch = s
        .branches
        .iter()
        .find(|b| b.id.matches_decoded(tag_value))
        .ok_or_else(|| Error::UnknownField(s.id_tag.clone()))?;
    let mut fields = add_fixed_proper(&branch.layout, d)?;
    fields.push((s.id_tag.clone(), branch.id.decoded()));
    Ok(Value::Object(fields))
}
