//! End-to-end scenarios and structural property tests exercising the whole
//! stack (layout construction, size, serialize, deserialize, endianness
//! rewriting, fixed/dynamic partitioning, discrimination) together, as
//! opposed to the per-module unit tests that live next to their engines.

use ethnum::{I256, U256};

use crate::discriminator::build_discriminator;
use crate::endian::set_endianness;
use crate::item::{
    ArrayItem, ArrayShape, BytesItem, BytesShape, Conversion, Endianness, Item, Layout, NamedItem, NumericItem,
    SwitchBranch, SwitchId, SwitchItem,
};
use crate::split::{add_fixed_values, dynamic_items_of, fixed_items_of};
use crate::value::Value;
use crate::{calc_size, calc_static_size, deserialize, serialize, ConversionCache};

fn u(size: u8) -> NumericItem {
    NumericItem::new(size)
}

fn named(name: &str, item: Item) -> NamedItem {
    NamedItem::new(name, item)
}

/// `header` (omitted 2-byte constant `[0,42]`), a switch on a 1-byte id
/// (1 → Name, 4 → IPv4), then a big-endian `port`.
fn endpoint_layout() -> Layout {
    let header = BytesItem::new(BytesShape::Fixed { size: 2 }).with_custom(Conversion::Constant {
        value: Value::Bytes(vec![0, 42]),
        omit: true,
    });

    let ipv4 = Layout::proper([named(
        "value",
        Item::Array(ArrayItem::new(ArrayShape::Fixed { length: 4 }, Layout::item(Item::UInt(u(1))))),
    )]);
    let name_bytes = BytesItem::new(BytesShape::Prefixed {
        length_size: 2,
        length_endianness: Endianness::Big,
    });
    let name_layout = Layout::proper([named("value", Item::Bytes(name_bytes))]);

    let switch = SwitchItem::new(
        1,
        vec![
            SwitchBranch {
                id: SwitchId::Labeled { wire: 1, label: "Name".into() },
                layout: as_proper(name_layout),
            },
            SwitchBranch {
                id: SwitchId::Labeled { wire: 4, label: "IPv4".into() },
                layout: as_proper(ipv4),
            },
        ],
    );

    Layout::proper([
        named("header", Item::Bytes(header)),
        named("address", Item::Switch(switch)),
        named("port", Item::UInt(u(2))),
    ])
}

fn as_proper(layout: Layout) -> crate::item::ProperLayout {
    match layout {
        Layout::Proper(p) => p,
        Layout::Item(_) => panic!("expected a proper layout"),
    }
}

fn bytes_value(bs: &[u8]) -> Value {
    Value::Bytes(bs.to_vec())
}

#[test]
fn endpoint_ipv4_round_trips() {
    let layout = endpoint_layout();
    let addr = Value::object([
        ("value", Value::Array(vec![Value::uint(127u8), Value::uint(0u8), Value::uint(0u8), Value::uint(1u8)])),
        ("id", Value::Label("IPv4".into())),
    ]);
    let data = Value::object([("address", addr), ("port", Value::uint(80u16))]);

    let bytes = serialize(&layout, &data).unwrap();
    assert_eq!(bytes, vec![0, 42, 4, 127, 0, 0, 1, 0, 80]);

    let decoded = deserialize(&layout, &bytes).unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn endpoint_name_decodes() {
    let layout = endpoint_layout();
    let wire: Vec<u8> = vec![0, 42, 1, 0, 9, 108, 111, 99, 97, 108, 104, 111, 115, 116, 0, 80];
    let decoded = deserialize(&layout, &wire).unwrap();

    let expected_addr = Value::object([
        ("value", bytes_value(b"localhost")),
        ("id", Value::Label("Name".into())),
    ]);
    let expected = Value::object([("address", expected_addr), ("port", Value::uint(80u16))]);
    assert_eq!(decoded, expected);
}

#[test]
fn same_family_ip_discriminator() {
    let ipv4 = Layout::item(Item::Array(ArrayItem::new(
        ArrayShape::Fixed { length: 4 },
        Layout::item(Item::UInt(u(1))),
    )));
    let ipv6 = Layout::item(Item::Array(ArrayItem::new(
        ArrayShape::Fixed { length: 8 },
        Layout::item(Item::UInt(u(1))),
    )));
    let disc = build_discriminator(&[ipv4, ipv6]).unwrap();

    assert_eq!(disc.classify(&[0u8; 4]), Some(0));
    assert_eq!(disc.classify(&[0u8; 16]), Some(1));
    assert_eq!(disc.classify(&[0u8; 5]), None);
}

#[test]
fn mixed_width_numerics_round_trip() {
    // { leI16: -2, leU64: 258 } plus a big-endian uint32 scaled by 100 and a
    // 9-byte (72-bit) hex-labelled field, preceded by an omitted uint8 const.
    let omit_const = NumericItem::new(1).with_custom(Conversion::Constant { value: Value::uint(42u8), omit: true });
    let le_i16 = NumericItem::new(2).with_endianness(Endianness::Little);
    let le_u64 = NumericItem::new(8).with_endianness(Endianness::Little);
    let fixed_dec = NumericItem::new(4).with_custom(Conversion::Fixed {
        from: Value::uint(258u32),
        to: Value::Label("2.58-ish".into()),
    });
    let hexnum = NumericItem::new(9).with_custom(Conversion::Fixed {
        from: Value::uint(0x1001u64),
        to: Value::Label("0x1001".into()),
    });

    let layout = Layout::proper([
        named("skip", Item::UInt(omit_const)),
        named("leI16", Item::Int(le_i16)),
        named("leU64", Item::UInt(le_u64)),
        named("fixedDec", Item::UInt(fixed_dec)),
        named("hexnum", Item::UInt(hexnum)),
    ]);

    let data = Value::object([
        ("leI16", Value::int(I256::from(-2i64))),
        ("leU64", Value::uint(U256::from(258u64))),
        ("fixedDec", Value::Label("2.58-ish".into())),
        ("hexnum", Value::Label("0x1001".into())),
    ]);

    let bytes = serialize(&layout, &data).unwrap();
    assert_eq!(bytes.len(), 1 + 2 + 8 + 4 + 9);
    assert_eq!(&bytes[0..1], &[42]);
    assert_eq!(&bytes[1..3], &[0xfe, 0xff]);

    let decoded = deserialize(&layout, &bytes).unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn length_prefixed_string_round_trips() {
    struct Utf8;
    impl crate::item::CustomConversion for Utf8 {
        fn to(&self, wire: &Value) -> Result<Value, crate::error::Error> {
            let bytes = wire.as_bytes().unwrap();
            let s = std::str::from_utf8(bytes).map_err(|e| crate::error::Error::IncompleteData(e.to_string()))?;
            Ok(Value::Label(s.into()))
        }
        fn from(&self, decoded: &Value) -> Result<Value, crate::error::Error> {
            let label = decoded
                .as_label()
                .ok_or_else(|| crate::error::Error::IncompleteData("expected a string label".into()))?;
            Ok(Value::Bytes(label.as_bytes().to_vec()))
        }
    }

    let item = BytesItem::new(BytesShape::Prefixed { length_size: 1, length_endianness: Endianness::Big })
        .with_custom(Conversion::Custom(std::sync::Arc::new(Utf8)));
    let layout = Layout::item(Item::Bytes(item));

    let data = Value::Label("Hello, World!".into());
    let bytes = serialize(&layout, &data).unwrap();
    assert_eq!(bytes.len(), 14);
    assert_eq!(bytes[0], 13);
    assert_eq!(&bytes[1..], b"Hello, World!");

    let decoded = deserialize(&layout, &bytes).unwrap();
    assert_eq!(decoded, data);
}

#[test]
fn endianness_idempotence() {
    let layout = endpoint_layout();
    let once = set_endianness(&layout, Endianness::Little);
    let twice = set_endianness(&once, Endianness::Little);
    assert_eq!(format!("{once:?}"), format!("{twice:?}"));
}

#[test]
fn static_size_agrees_with_data_size_when_known() {
    let layout = Layout::proper([named("a", Item::UInt(u(4))), named("b", Item::Int(u(2)))]);
    let data = Value::object([("a", Value::uint(7u32)), ("b", Value::int(-1i16))]);

    let mut cache = ConversionCache::new();
    let data_size = calc_size(&layout, &data, &mut cache).unwrap();
    assert_eq!(calc_static_size(&layout), Some(data_size));
}

#[test]
fn partition_completeness_round_trips_through_dynamic_half() {
    let layout = Layout::proper([
        named(
            "magic",
            Item::UInt(NumericItem::new(2).with_custom(Conversion::Constant { value: Value::uint(0xCAFEu32), omit: false })),
        ),
        named("count", Item::UInt(u(1))),
    ]);
    let data = Value::object([("magic", Value::uint(0xCAFEu32)), ("count", Value::uint(3u8))]);

    let dynamic_layout = dynamic_items_of(&layout);
    let dynamic_fields = match &dynamic_layout {
        Layout::Proper(p) => p.items.iter().map(|n| &n.name).collect::<Vec<_>>(),
        Layout::Item(_) => panic!(),
    };
    assert_eq!(dynamic_fields, vec![&Box::<str>::from("count")]);

    let dynamic_only = Value::object([("count", Value::uint(3u8))]);
    let rehydrated = add_fixed_values(&layout, &dynamic_only).unwrap();
    assert_eq!(rehydrated, data);

    let fixed_layout = fixed_items_of(&layout);
    assert!(matches!(&fixed_layout, Layout::Proper(p) if p.items.len() == 1 && &*p.items[0].name == "magic"));
}

#[test]
fn discriminator_prefers_smaller_worst_case_partition_and_never_guesses() {
    let a = Layout::proper([
        named(
            "tag",
            Item::UInt(NumericItem::new(2).with_custom(Conversion::Constant { value: Value::uint(0u32), omit: false })),
        ),
        named("payload", Item::UInt(u(1))),
    ]);
    let b = Layout::proper([
        named(
            "tag",
            Item::Bytes(
                BytesItem::new(BytesShape::Fixed { size: 2 })
                    .with_custom(Conversion::Constant { value: Value::Bytes(vec![1, 1]), omit: false }),
            ),
        ),
        named("payload", Item::UInt(u(1))),
    ]);
    let c = Layout::item(Item::UInt(u(2)));

    let disc = build_discriminator(&[a, b, c]).unwrap();
    assert_eq!(disc.classify(&[0, 0, 0]), Some(0));
    assert_eq!(disc.classify(&[1, 1, 0]), Some(1));
    assert_eq!(disc.classify(&[0, 0]), Some(2));
    assert_eq!(disc.classify(&[0, 1, 0]), Some(0));
    assert_eq!(disc.classify(&[1, 0, 0]), Some(1));
    assert_eq!(disc.classify(&[2, 0, 0]), None);
    assert_eq!(disc.classify(&[1, 0, 0, 0]), None);
    assert_eq!(disc.classify(&[0]), None);
}
