//! Property-based tests over the round-trip and size-agreement invariants,
//! generating matched `(Layout, Value)` pairs by hand the way the corpus's
//! `commitlog` payload tests build `gen_*` strategies for recursive wire
//! formats rather than leaning on a blanket `#[derive(Arbitrary)]`.

use ethnum::{I256, U256};
use proptest::prelude::*;

use crate::item::{ArrayItem, ArrayShape, BytesItem, BytesShape, Endianness, Item, Layout, NamedItem, NumericItem};
use crate::value::Value;
use crate::{calc_size, calc_static_size, deserialize, serialize, ConversionCache};

fn endianness() -> impl Strategy<Value = Endianness> {
    prop_oneof![Just(Endianness::Big), Just(Endianness::Little)]
}

/// A numeric item of 1..=8 bytes together with a value that is guaranteed to
/// fit its declared width and signedness.
fn numeric_field(signed: bool) -> impl Strategy<Value = (Item, Value)> {
    (1u8..=8u8, endianness()).prop_flat_map(move |(size, e)| {
        let bits = 8u32 * size as u32;
        if signed {
            let limit: i128 = 1i128 << (bits - 1);
            (-limit..limit)
                .prop_map(move |v| (Item::Int(NumericItem::new(size).with_endianness(e)), Value::Int(I256::from(v))))
                .boxed()
        } else {
            let limit: u128 = 1u128 << bits;
            (0u128..limit)
                .prop_map(move |v| (Item::UInt(NumericItem::new(size).with_endianness(e)), Value::UInt(U256::from(v))))
                .boxed()
        }
    })
}

/// A fixed-size `bytes` item paired with a payload of exactly that length.
fn bytes_fixed_field() -> impl Strategy<Value = (Item, Value)> {
    (0usize..=8).prop_flat_map(|size| {
        proptest::collection::vec(any::<u8>(), size)
            .prop_map(move |bs| (Item::Bytes(BytesItem::new(BytesShape::Fixed { size })), Value::Bytes(bs)))
    })
}

/// A length-prefixed `bytes` item paired with a payload of arbitrary length.
fn bytes_prefixed_field() -> impl Strategy<Value = (Item, Value)> {
    (1u8..=2u8, endianness(), proptest::collection::vec(any::<u8>(), 0..64)).prop_map(|(length_size, e, bs)| {
        let item = BytesItem::new(BytesShape::Prefixed { length_size, length_endianness: e });
        (Item::Bytes(item), Value::Bytes(bs))
    })
}

/// A fixed-length array of numerics all sharing one element width/endianness/signedness.
fn numeric_array_field() -> impl Strategy<Value = (Item, Value)> {
    (any::<bool>(), 1u8..=4u8, endianness(), 0usize..=5).prop_flat_map(|(signed, size, e, length)| {
        let bits = 8u32 * size as u32;
        if signed {
            let limit: i128 = 1i128 << (bits - 1);
            proptest::collection::vec(-limit..limit, length)
                .prop_map(move |vals| {
                    let element = Layout::item(Item::Int(NumericItem::new(size).with_endianness(e)));
                    let values = vals.into_iter().map(|v| Value::Int(I256::from(v))).collect();
                    (Item::Array(ArrayItem::new(ArrayShape::Fixed { length }, element)), Value::Array(values))
                })
                .boxed()
        } else {
            let limit: u128 = 1u128 << bits;
            proptest::collection::vec(0u128..limit, length)
                .prop_map(move |vals| {
                    let element = Layout::item(Item::UInt(NumericItem::new(size).with_endianness(e)));
                    let values = vals.into_iter().map(|v| Value::UInt(U256::from(v))).collect();
                    (Item::Array(ArrayItem::new(ArrayShape::Fixed { length }, element)), Value::Array(values))
                })
                .boxed()
        }
    })
}

fn any_field() -> impl Strategy<Value = (Item, Value)> {
    prop_oneof![
        numeric_field(true),
        numeric_field(false),
        bytes_fixed_field(),
        bytes_prefixed_field(),
        numeric_array_field(),
    ]
}

/// A proper layout of 1..=5 uniquely-named fields, each independently one of
/// the item/value shapes above, and the matching whole-object value.
fn proper_layout_and_value() -> impl Strategy<Value = (Layout, Value)> {
    proptest::collection::vec(any_field(), 1..=5).prop_map(|fields| {
        let named: Vec<NamedItem> = fields
            .iter()
            .enumerate()
            .map(|(i, (item, _))| NamedItem::new(format!("f{i}"), item.clone()))
            .collect();
        let data = Value::object(fields.into_iter().enumerate().map(|(i, (_, v))| (format!("f{i}"), v)));
        (Layout::proper(named), data)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property 1 (round-trip): `deserialize(L, serialize(L, v)) == v`.
    #[test]
    fn roundtrip((layout, data) in proper_layout_and_value()) {
        let bytes = serialize(&layout, &data).unwrap();
        let decoded = deserialize(&layout, &bytes).unwrap();
        prop_assert_eq!(decoded, data);
    }

    /// Property 2 (length agreement): `serialize(L, v).len() == calc_size(L, v)`.
    #[test]
    fn length_agreement((layout, data) in proper_layout_and_value()) {
        let bytes = serialize(&layout, &data).unwrap();
        let mut cache = ConversionCache::new();
        let computed = calc_size(&layout, &data, &mut cache).unwrap();
        prop_assert_eq!(bytes.len(), computed);
    }

    /// Property 5 (static implies data): every field here has a statically
    /// known size (no custom conversions, no boundless/prefixed-length
    /// ambiguity beyond what `calc_static_size` already resolves), so when it
    /// reports a size it must equal the data-driven size for any legal value.
    #[test]
    fn static_size_matches_data_size_when_known((layout, data) in proper_layout_and_value()) {
        if let Some(static_size) = calc_static_size(&layout) {
            let mut cache = ConversionCache::new();
            let data_size = calc_size(&layout, &data, &mut cache).unwrap();
            prop_assert_eq!(static_size, data_size);
        }
    }

    /// Property 3 (endianness idempotence), restricted to this generator's
    /// numeric/bytes/array shapes.
    #[test]
    fn endianness_idempotent((layout, _) in proper_layout_and_value(), e in endianness()) {
        let once = crate::endian::set_endianness(&layout, e);
        let twice = crate::endian::set_endianness(&once, e);
        prop_assert_eq!(format!("{once:?}"), format!("{twice:?}"));
    }
}
