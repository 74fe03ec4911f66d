//! Codec hot-path benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use fablink::protocol::{crc8, packet, PacketDecoder};

fn crc_benchmark(c: &mut Criterion) {
    let payload: Vec<u8> = (0..32).map(|i| (i * 7) as u8).collect();

    let mut group = c.benchmark_group("crc");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("crc8_32b", |b| {
        b.iter(|| {
            let crc = crc8(black_box(&payload));
            black_box(crc)
        })
    });

    group.finish();
}

fn codec_benchmark(c: &mut Criterion) {
    let payload: Vec<u8> = (0..32).map(|i| (i * 13) as u8).collect();
    let encoded = packet::encode(&payload).unwrap();

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(encoded.len() as u64));

    group.bench_function("encode", |b| {
        b.iter(|| {
            let packet = packet::encode(black_box(&payload)).unwrap();
            black_box(packet)
        })
    });

    group.bench_function("decode", |b| {
        b.iter(|| {
            let decoded = packet::decode(black_box(&encoded)).unwrap();
            black_box(decoded)
        })
    });

    group.bench_function("stream_decode", |b| {
        b.iter(|| {
            let mut decoder = PacketDecoder::new();
            for &byte in encoded.iter() {
                decoder.feed(black_box(byte)).unwrap();
            }
            black_box(decoder.into_payload())
        })
    });

    group.finish();
}

criterion_group!(benches, crc_benchmark, codec_benchmark);
criterion_main!(benches);
