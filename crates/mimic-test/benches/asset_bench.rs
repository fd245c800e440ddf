//! Benchmarks for model parsing

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use mimic_asset::{glb, FormatLoader, GlbLoader, GltfLoader};
use mimic_test::ModelFixture;

fn bench_parse(c: &mut Criterion) {
    let fixture = ModelFixture::nodding_head();
    let gltf: Bytes = fixture.to_gltf();
    let glb_data: Bytes = fixture.to_glb();

    let mut group = c.benchmark_group("parse");

    group.throughput(Throughput::Bytes(gltf.len() as u64));
    group.bench_function("gltf_json", |b| {
        b.iter(|| GltfLoader.parse("head.gltf", black_box(&gltf)).unwrap())
    });

    group.throughput(Throughput::Bytes(glb_data.len() as u64));
    group.bench_function("glb_with_clip", |b| {
        b.iter(|| GlbLoader.parse("head.glb", black_box(&glb_data)).unwrap())
    });

    group.finish();
}

fn bench_glb_split(c: &mut Criterion) {
    let data = ModelFixture::nodding_head().to_glb();

    c.bench_function("glb_split", |b| {
        b.iter(|| glb::split("head.glb", black_box(&data)).unwrap())
    });
}

criterion_group!(benches, bench_parse, bench_glb_split);
criterion_main!(benches);
