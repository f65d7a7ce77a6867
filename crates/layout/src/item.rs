//! The layout algebra: the data model of items and composite layouts.
//!
//! A [`Layout`] has two top-level shapes — a single unnamed [`Item`], or a
//! [`ProperLayout`] (an ordered sequence of named items). Constructors here
//! perform no validation; invariants (unique names, boundless-must-be-last,
//! non-empty switch branch lists, ...) are enforced by [`Layout::validate`]
//! and, lazily, by the engines the first time they walk a violating item.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::Error;
use crate::value::Value;

/// Byte order for a multi-byte numeric, length prefix, or switch id.
/// Width-1 fields ignore this entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "proptest", derive(proptest_derive::Arbitrary))]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

/// Either a single item or a sequence of named items.
#[derive(Clone, Debug)]
pub enum Layout {
    Item(Box<Item>),
    Proper(ProperLayout),
}

impl Layout {
    pub fn item(item: Item) -> Layout {
        Layout::Item(Box::new(item))
    }

    pub fn proper(items: impl IntoIterator<Item = NamedItem>) -> Layout {
        Layout::Proper(ProperLayout {
            items: items.into_iter().collect(),
        })
    }

    /// `true` for a single unnamed item, `false` for a proper layout.
    pub fn is_item(&self) -> bool {
        matches!(self, Layout::Item(_))
    }

    /// `true` for a proper layout (an ordered sequence of named items).
    pub fn is_proper(&self) -> bool {
        matches!(self, Layout::Proper(_))
    }

    /// Checks the structural invariants from the base spec's §3, recursively.
    /// Engines call this lazily on first use; callers may call it eagerly to
    /// front-load the check instead of discovering it mid-serialize.
    pub fn validate(&self) -> Result<(), Error> {
        validate_layout(self, true)
    }
}

/// An ordered sequence of named items. Every name in the sequence is unique.
#[derive(Clone, Debug, Default)]
pub struct ProperLayout {
    pub items: Vec<NamedItem>,
}

impl ProperLayout {
    pub fn field(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|n| &*n.name == name).map(|n| &n.item)
    }
}

#[derive(Clone, Debug)]
pub struct NamedItem {
    pub name: Box<str>,
    pub item: Item,
}

impl NamedItem {
    pub fn new(name: impl Into<Box<str>>, item: Item) -> NamedItem {
        NamedItem {
            name: name.into(),
            item,
        }
    }
}

/// One typed field. The `binary` tag is the enum discriminant itself.
#[derive(Clone, Debug)]
pub enum Item {
    Int(NumericItem),
    UInt(NumericItem),
    Bytes(BytesItem),
    Array(ArrayItem),
    Switch(SwitchItem),
}

#[derive(Clone, Debug)]
pub struct NumericItem {
    /// Byte width: 1..=6 decodes as a 64-bit-safe integer on the wire, but is
    /// always represented as a widened 256-bit [`crate::value::Value`] in
    /// this implementation; 7..=32 is true arbitrary-precision width.
    pub size: u8,
    pub endianness: Endianness,
    pub custom: Option<Conversion>,
}

impl NumericItem {
    pub fn new(size: u8) -> NumericItem {
        NumericItem {
            size,
            endianness: Endianness::default(),
            custom: None,
        }
    }

    pub fn with_endianness(mut self, e: Endianness) -> NumericItem {
        self.endianness = e;
        self
    }

    pub fn with_custom(mut self, c: Conversion) -> NumericItem {
        self.custom = Some(c);
        self
    }
}

/// The three mutually-exclusive shapes a `bytes` item can take. Because
/// `size` and `lengthSize` live in different enum variants, "both set" is
/// not a representable state — the base spec's `size`/`lengthSize`
/// mutual-exclusion invariant is enforced by construction rather than by a
/// runtime check.
#[derive(Clone, Debug)]
pub enum BytesShape {
    Fixed { size: usize },
    Prefixed { length_size: u8, length_endianness: Endianness },
    Boundless,
}

impl BytesShape {
    /// How many bytes the length prefix itself takes up: 0 unless `Prefixed`.
    pub fn prefix_len(&self) -> usize {
        match self {
            BytesShape::Prefixed { length_size, .. } => *length_size as usize,
            _ => 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BytesItem {
    pub shape: BytesShape,
    /// A nested layout whose serialization fills the byte region.
    pub layout: Option<Box<Layout>>,
    pub custom: Option<Conversion>,
    /// Memoized wire bytes for a fixed-object conversion (`custom` is
    /// [`Conversion::Fixed`] with an `Value::Object` `from`, serialized
    /// through `layout`). Written at most once; see the base spec's §3/§5
    /// on idempotent lazy caches.
    pub(crate) fixed_cache: OnceCell<Vec<u8>>,
}

impl BytesItem {
    pub fn new(shape: BytesShape) -> BytesItem {
        BytesItem {
            shape,
            layout: None,
            custom: None,
            fixed_cache: OnceCell::new(),
        }
    }

    pub fn with_layout(mut self, layout: Layout) -> BytesItem {
        self.layout = Some(Box::new(layout));
        self
    }

    pub fn with_custom(mut self, c: Conversion) -> BytesItem {
        self.custom = Some(c);
        self
    }
}

#[derive(Clone, Debug)]
pub enum ArrayShape {
    Fixed { length: usize },
    Prefixed { length_size: u8, length_endianness: Endianness },
    Boundless,
}

impl ArrayShape {
    /// How many bytes the length prefix itself takes up: 0 unless `Prefixed`.
    pub fn prefix_len(&self) -> usize {
        match self {
            ArrayShape::Prefixed { length_size, .. } => *length_size as usize,
            _ => 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ArrayItem {
    pub shape: ArrayShape,
    pub element: Box<Layout>,
}

impl ArrayItem {
    pub fn new(shape: ArrayShape, element: Layout) -> ArrayItem {
        ArrayItem {
            shape,
            element: Box::new(element),
        }
    }
}

/// The wire id of a switch branch: either a plain number, or a number
/// remapped to an arbitrary decoded label.
#[derive(Clone, Debug)]
pub enum SwitchId {
    Plain(u64),
    Labeled { wire: u64, label: Box<str> },
}

impl SwitchId {
    pub fn wire(&self) -> u64 {
        match self {
            SwitchId::Plain(id) => *id,
            SwitchId::Labeled { wire, .. } => *wire,
        }
    }

    /// The value spliced into the decoded object under `idTag`.
    pub fn decoded(&self) -> Value {
        match self {
            SwitchId::Plain(id) => Value::uint(*id as u128),
            SwitchId::Labeled { label, .. } => Value::Label(label.clone()),
        }
    }

    /// Does `candidate` (a decoded discriminant value) select this id?
    pub fn matches_decoded(&self, candidate: &Value) -> bool {
        match (self, candidate) {
            (SwitchId::Plain(id), Value::UInt(_) | Value::Int(_)) => {
                crate::util::num_eq(&Value::uint(*id as u128), candidate)
            }
            (SwitchId::Labeled { label, .. }, Value::Label(l)) => label == l,
            _ => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SwitchBranch {
    pub id: SwitchId,
    pub layout: ProperLayout,
}

#[derive(Clone, Debug)]
pub struct SwitchItem {
    pub id_size: u8,
    pub id_endianness: Endianness,
    /// Name of the discriminant field in the decoded object. Default `"id"`.
    pub id_tag: Box<str>,
    /// Non-empty; all ids pairwise distinct at the wire level.
    pub branches: Vec<SwitchBranch>,
}

impl SwitchItem {
    pub fn new(id_size: u8, branches: Vec<SwitchBranch>) -> SwitchItem {
        SwitchItem {
            id_size,
            id_endianness: Endianness::default(),
            id_tag: "id".into(),
            branches,
        }
    }

    pub fn branch_for_wire(&self, wire_id: u64) -> Option<&SwitchBranch> {
        self.branches.iter().find(|b| b.id.wire() == wire_id)
    }

    pub fn branch_for_decoded(&self, tag_value: &Value) -> Option<&SwitchBranch> {
        self.branches.iter().find(|b| b.id.matches_decoded(tag_value))
    }
}

/// A user-provided bidirectional transform between the wire representation
/// and the decoded value, plus the two constant-like shortcuts that don't
/// need a real function.
#[derive(Clone)]
pub enum Conversion {
    /// The wire value is fixed; on encode the supplied value is ignored (and,
    /// if `omit`, absent from input/output objects altogether); on decode the
    /// bytes read must equal it.
    Constant { value: Value, omit: bool },
    /// Wire value is `from`; decoded value is the arbitrary label `to`.
    Fixed { from: Value, to: Value },
    /// An arbitrary, opaque bidirectional transform.
    Custom(Arc<dyn CustomConversion>),
}

impl std::fmt::Debug for Conversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conversion::Constant { value, omit } => {
                f.debug_struct("Constant").field("value", value).field("omit", omit).finish()
            }
            Conversion::Fixed { from, to } => f.debug_struct("Fixed").field("from", from).field("to", to).finish(),
            Conversion::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Implemented by the arbitrary, opaque transform a [`Conversion::Custom`]
/// carries. The codec treats `to`/`from` as black boxes: it never inspects
/// what they do, only caches how often it calls them.
pub trait CustomConversion: Send + Sync {
    /// Wire bytes (for a `bytes` item) or the wire numeric (for a numeric
    /// item, passed as `Value::Int`/`Value::UInt`) to decoded value.
    fn to(&self, wire: &Value) -> Result<Value, Error>;
    /// Decoded value back to the wire representation.
    fn from(&self, decoded: &Value) -> Result<Value, Error>;
}

fn validate_layout(layout: &Layout, is_tail: bool) -> Result<(), Error> {
    match layout {
        Layout::Item(item) => validate_item(item, is_tail),
        Layout::Proper(proper) => validate_proper(proper),
    }
}

fn validate_proper(proper: &ProperLayout) -> Result<(), Error> {
    let mut seen = std::collections::HashSet::new();
    let last = proper.items.len().saturating_sub(1);
    for (i, named) in proper.items.iter().enumerate() {
        if !seen.insert(&named.name) {
            return Err(Error::MalformedLayout(format!("duplicate field name `{}`", named.name)));
        }
        validate_item(&named.item, i == last).map_err(|e| e.in_field(named.name.clone()))?;
    }
    Ok(())
}

fn validate_item(item: &Item, is_tail: bool) -> Result<(), Error> {
    match item {
        Item::Int(n) | Item::UInt(n) => {
            if n.size == 0 || n.size > 32 {
                return Err(Error::MalformedLayout(format!("numeric size {} out of range 1..=32", n.size)));
            }
            Ok(())
        }
        Item::Bytes(b) => {
            if let BytesShape::Boundless = b.shape {
                if !is_tail {
                    return Err(Error::MalformedLayout(
                        "a boundless bytes item may only appear last in its layout".into(),
                    ));
                }
            }
            if let BytesShape::Prefixed { length_size, .. } = b.shape {
                if !(1..=6).contains(&length_size) {
                    return Err(Error::MalformedLayout(format!("lengthSize {length_size} out of range 1..=6")));
                }
            }
            if let Some(nested) = &b.layout {
                validate_layout(nested, true)?;
            }
            Ok(())
        }
        Item::Array(a) => {
            if let ArrayShape::Boundless = a.shape {
                if !is_tail {
                    return Err(Error::MalformedLayout(
                        "a boundless array item may only appear last in its layout".into(),
                    ));
                }
            }
            validate_layout(&a.element, true)
        }
        Item::Switch(s) => {
            if s.branches.is_empty() {
                return Err(Error::MalformedLayout("switch must have at least one branch".into()));
            }
            if !(1..=6).contains(&s.id_size) {
                return Err(Error::MalformedLayout(format!("idSize {} out of range 1..=6", s.id_size)));
            }
            let mut seen = std::collections::HashSet::new();
            for branch in &s.branches {
                if !seen.insert(branch.id.wire()) {
                    return Err(Error::MalformedLayout(format!(
                        "duplicate switch id {} at the wire level",
                        branch.id.wire()
                    )));
                }
                validate_proper(&branch.layout)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundless_bytes_must_be_last() {
        let layout = Layout::proper([
            NamedItem::new("body", Item::Bytes(BytesItem::new(BytesShape::Boundless))),
            NamedItem::new("trailer", Item::UInt(NumericItem::new(1))),
        ]);
        assert!(matches!(layout.validate(), Err(Error::MalformedLayout(_))));
    }

    #[test]
    fn boundless_array_must_be_last() {
        let layout = Layout::proper([
            NamedItem::new(
                "items",
                Item::Array(ArrayItem::new(ArrayShape::Boundless, Layout::item(Item::UInt(NumericItem::new(1))))),
            ),
            NamedItem::new("trailer", Item::UInt(NumericItem::new(1))),
        ]);
        assert!(matches!(layout.validate(), Err(Error::MalformedLayout(_))));
    }

    #[test]
    fn boundless_item_as_sole_or_last_field_is_fine() {
        let layout = Layout::proper([
            NamedItem::new("count", Item::UInt(NumericItem::new(1))),
            NamedItem::new("body", Item::Bytes(BytesItem::new(BytesShape::Boundless))),
        ]);
        assert!(layout.validate().is_ok());
    }
}
