//! [`set_endianness`]: a deep, non-mutating rewrite of a layout's byte order.
//!
//! Produces a structurally identical layout where every multi-byte numeric,
//! length prefix, and switch id uses the requested [`Endianness`]. Width-1
//! fields are untouched since byte order is meaningless for them. Conversion
//! closures (`Custom`) are opaque and are carried over unchanged — the
//! rewrite only ever touches shape and width metadata, never what a
//! conversion does with the bytes it's handed.

use crate::item::{
    ArrayItem, ArrayShape, BytesItem, BytesShape, Endianness, Item, Layout, NamedItem, NumericItem, ProperLayout,
    SwitchBranch, SwitchItem,
};

/// Returns a copy of `layout` with every numeric, length, and switch-id field
/// wider than one byte rewritten to `endianness`.
pub fn set_endianness(layout: &Layout, endianness: Endianness) -> Layout {
    match layout {
        Layout::Item(item) => Layout::Item(Box::new(rewrite_item(item, endianness))),
        Layout::Proper(proper) => Layout::Proper(rewrite_proper(proper, endianness)),
    }
}

fn rewrite_proper(proper: &ProperLayout, endianness: Endianness) -> ProperLayout {
    ProperLayout {
        items: proper
            .items
            .iter()
            .map(|named| NamedItem {
                name: named.name.clone(),
                item: rewrite_item(&named.item, endianness),
            })
            .collect(),
    }
}

fn rewrite_item(item: &Item, endianness: Endianness) -> Item {
    match item {
        Item::Int(n) => Item::Int(rewrite_numeric(n, endianness)),
        Item::UInt(n) => Item::UInt(rewrite_numeric(n, endianness)),
        Item::Bytes(b) => Item::Bytes(rewrite_bytes(b, endianness)),
        Item::Array(a) => Item::Array(rewrite_array(a, endianness)),
        Item::Switch(s) => Item::Switch(rewrite_switch(s, endianness)),
    }
}

fn rewrite_numeric(n: &NumericItem, endianness: Endianness) -> NumericItem {
    NumericItem {
        size: n.size,
        endianness: if n.size > 1 { endianness } else { n.endianness },
        custom: n.custom.clone(),
    }
}

fn rewrite_bytes(b: &BytesItem, endianness: Endianness) -> BytesItem {
    BytesItem {
        shape: rewrite_bytes_shape(&b.shape, endianness),
        layout: b.layout.as_ref().map(|l| Box::new(set_endianness(l, endianness))),
        custom: b.custom.clone(),
        fixed_cache: once_cell::sync::OnceCell::new(),
    }
}

fn rewrite_bytes_shape(shape: &BytesShape, endianness: Endianness) -> BytesShape {
    match shape {
        BytesShape::Prefixed { length_size, length_endianness } => BytesShape::Prefixed {
            length_size: *length_size,
            length_endianness: if *length_size > 1 { endianness } else { *length_endianness },
        },
        other => other.clone(),
    }
}

fn rewrite_array(a: &ArrayItem, endianness: Endianness) -> ArrayItem {
    ArrayItem {
        shape: rewrite_array_shape(&a.shape, endianness),
        element: Box::new(set_endianness(&a.element, endianness)),
    }
}

fn rewrite_array_shape(shape: &ArrayShape, endianness: Endianness) -> ArrayShape {
    match shape {
        ArrayShape::Prefixed { length_size, length_endianness } => ArrayShape::Prefixed {
            length_size: *length_size,
            length_endianness: if *length_size > 1 { endianness } else { *length_endianness },
        },
        other => other.clone(),
    }
}

fn rewrite_switch(s: &SwitchItem, endianness: Endianness) -> SwitchItem {
    SwitchItem {
        id_size: s.id_size,
        id_endianness: if s.id_size > 1 { endianness } else { s.id_endianness },
        id_tag: s.id_tag.clone(),
        branches: s
            .branches
            .iter()
            .map(|branch| SwitchBranch {
                id: branch.id.clone(),
                layout: rewrite_proper(&branch.layout, endianness),
            })
            .collect(),
    }
}
