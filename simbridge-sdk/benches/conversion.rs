use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use simbridge_sdk::{Converter, MessageRegistry};
use simbridge_types::{
    schema, Header, Message, Quaternion, TfMessage, Time, TransformStamped, Vector3,
};

fn tf_message(count: usize) -> TfMessage {
    (0..count)
        .map(|i| {
            let mut transform = TransformStamped::new("world", format!("robot{i}"))
                .with_translation(Vector3::new(i as f64, 2.0 * i as f64, 0.5))
                .with_rotation(Quaternion::identity());
            transform.header = Header::new("world")
                .with_seq(i as u32)
                .with_stamp(Time::new(1_700_000_000, i as u32));
            transform
        })
        .collect()
}

/// Encode TF messages of increasing size through the typed converter
fn bench_encode_tf(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_tf");
    let converter = Converter::<TfMessage>::new();

    for count in [1usize, 10, 100, 1000] {
        let value = tf_message(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &value, |b, value| {
            b.iter(|| black_box(converter.encode_value(value).unwrap()));
        });
    }
    group.finish();
}

/// Decode the same documents back
fn bench_decode_tf(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_tf");
    let converter = Converter::<TfMessage>::new();

    for count in [1usize, 10, 100, 1000] {
        let document = converter.encode_value(&tf_message(count)).unwrap();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(count),
            &document,
            |b, document| {
                b.iter(|| black_box(converter.decode_value(document).unwrap()));
            },
        );
    }
    group.finish();
}

/// Dynamic dispatch through the registry, as channels do it
fn bench_registry_roundtrip(c: &mut Criterion) {
    let registry = MessageRegistry::with_builtin();
    let message = Message::from(tf_message(10));

    c.bench_function("registry_lookup_encode_decode", |b| {
        b.iter(|| {
            let converter = registry.lookup(schema::TF_MESSAGE).unwrap();
            let document = converter.encode(black_box(&message)).unwrap();
            black_box(converter.decode(&document).unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_encode_tf,
    bench_decode_tf,
    bench_registry_roundtrip
);
criterion_main!(benches);
