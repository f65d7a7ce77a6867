//! Serialize/deserialize hot-path benchmarks over a representative mix of
//! numeric, bytes, array and switch items.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use layout::{
    deserialize, serialize, ArrayItem, ArrayShape, BytesItem, BytesShape, Conversion, Endianness, Item, Layout,
    NamedItem, NumericItem, SwitchBranch, SwitchId, SwitchItem, Value,
};

fn endpoint_layout() -> Layout {
    let header = BytesItem::new(BytesShape::Fixed { size: 2 }).with_custom(Conversion::Constant {
        value: Value::Bytes(vec![0, 42]),
        omit: true,
    });
    let ipv4 = Layout::proper([NamedItem::new(
        "value",
        Item::Array(ArrayItem::new(
            ArrayShape::Fixed { length: 4 },
            Layout::item(Item::UInt(NumericItem::new(1))),
        )),
    )]);
    let switch = SwitchItem::new(
        1,
        vec![SwitchBranch {
            id: SwitchId::Labeled { wire: 4, label: "IPv4".into() },
            layout: as_proper(ipv4),
        }],
    );
    Layout::proper([
        NamedItem::new("header", Item::Bytes(header)),
        NamedItem::new("address", Item::Switch(switch)),
        NamedItem::new("port", Item::UInt(NumericItem::new(2).with_endianness(Endianness::Big))),
    ])
}

fn as_proper(layout: Layout) -> layout::ProperLayout {
    match layout {
        Layout::Proper(p) => p,
        Layout::Item(_) => unreachable!(),
    }
}

fn endpoint_value() -> Value {
    let addr = Value::object([
        ("value", Value::Array(vec![Value::uint(127u8), Value::uint(0u8), Value::uint(0u8), Value::uint(1u8)])),
        ("id", Value::Label("IPv4".into())),
    ]);
    Value::object([("address", addr), ("port", Value::uint(8080u16))])
}

fn array_layout(len: usize) -> Layout {
    Layout::item(Item::Array(ArrayItem::new(
        ArrayShape::Fixed { length: len },
        Layout::item(Item::UInt(NumericItem::new(4).with_endianness(Endianness::Little))),
    )))
}

fn array_value(len: usize) -> Value {
    Value::Array((0..len as u32).map(|i| Value::uint(i)).collect())
}

fn bench_endpoint(c: &mut Criterion) {
    let layout = endpoint_layout();
    let data = endpoint_value();
    let wire = serialize(&layout, &data).unwrap();

    let mut group = c.benchmark_group("endpoint");
    group.throughput(Throughput::Elements(1));
    group.bench_function("serialize", |b| b.iter(|| serialize(black_box(&layout), black_box(&data)).unwrap()));
    group.bench_function("deserialize", |b| b.iter(|| deserialize(black_box(&layout), black_box(&wire)).unwrap()));
    group.finish();
}

fn bench_arrays(c: &mut Criterion) {
    let mut group = c.benchmark_group("uint32_array");
    for len in [16usize, 256, 4096] {
        let layout = array_layout(len);
        let data = array_value(len);
        let wire = serialize(&layout, &data).unwrap();
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("serialize", len), &len, |b, _| {
            b.iter(|| serialize(black_box(&layout), black_box(&data)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("deserialize", len), &len, |b, _| {
            b.iter(|| deserialize(black_box(&layout), black_box(&wire)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_endpoint, bench_arrays);
criterion_main!(benches);
