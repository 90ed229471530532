//! Performance benchmarks for control-channel command handling.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench command_parse_bench
//! ```

use bytes::BytesMut;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};

use dactyl_core::{Finger, Print};
use dactyl_protocol::{CommandCodec, MatchOutcome, SimCommand};

fn bench_parse_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_add");
    group.throughput(Throughput::Elements(1));

    group.bench_function("parse_add_command", |b| {
        b.iter(|| {
            let cmd = SimCommand::parse(black_box("ADD left-little testuser 1")).unwrap();
            black_box(cmd);
        });
    });

    group.finish();
}

fn bench_codec_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_round_trip");
    group.throughput(Throughput::Elements(1));

    let command = SimCommand::Add {
        finger: Finger::RightThumb,
        username: "testuser".into(),
        outcome: MatchOutcome::Match,
    };

    group.bench_function("encode_then_decode", |b| {
        b.iter(|| {
            let mut codec = CommandCodec::new();
            let mut buffer = BytesMut::new();
            codec.encode(black_box(command.clone()), &mut buffer).unwrap();
            let decoded = codec.decode(&mut buffer).unwrap();
            black_box(decoded);
        });
    });

    group.finish();
}

fn bench_print_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("print_serialize");
    group.throughput(Throughput::Elements(1));

    let print = Print::builder("virtual_device")
        .finger(Finger::LeftIndex)
        .username("testuser")
        .template(vec![0xA5; 64])
        .build()
        .unwrap();

    group.bench_function("serialize_deserialize", |b| {
        b.iter(|| {
            let bytes = black_box(&print).serialize().unwrap();
            let copy = Print::deserialize(&bytes).unwrap();
            black_box(copy);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parse_add,
    bench_codec_round_trip,
    bench_print_serialize
);
criterion_main!(benches);
