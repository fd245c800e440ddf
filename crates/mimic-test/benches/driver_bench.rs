//! Benchmarks for the per-frame animation path

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mimic_asset::{AssetLoader, Candidate, LoadedAsset, LoaderConfig, MemorySource};
use mimic_runtime::smooth;
use mimic_scene::SkeletonIntrospector;
use mimic_test::{FrameSimulator, ModelFixture, SimulatorConfig};

fn load(fixture: ModelFixture) -> LoadedAsset {
    let source = MemorySource::new();
    fixture.install(&source, "head");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    runtime
        .block_on(AssetLoader::new(source, LoaderConfig::single_pass()).load(&[Candidate::new("head.glb")]))
        .unwrap()
}

fn uncapped() -> SimulatorConfig {
    let mut config = SimulatorConfig::default();
    config.driver.max_fps = None;
    config
}

fn bench_frame_speaking(c: &mut Criterion) {
    let mut sim = FrameSimulator::new(uncapped()).unwrap();
    sim.attach(load(ModelFixture::nodding_head())).unwrap();
    sim.speak(Duration::from_secs(3600));

    c.bench_function("frame_speaking", |b| {
        b.iter(|| {
            let sample = sim.step();
            sim.clear_trace();
            black_box(sample)
        })
    });
}

fn bench_frame_idle_no_model(c: &mut Criterion) {
    let mut sim = FrameSimulator::new(uncapped()).unwrap();

    c.bench_function("frame_idle_no_model", |b| {
        b.iter(|| {
            let sample = sim.step();
            sim.clear_trace();
            black_box(sample)
        })
    });
}

fn bench_introspect(c: &mut Criterion) {
    let asset = load(ModelFixture::talking_head());
    let scene = asset.model.scene;
    let introspector = SkeletonIntrospector::default();

    c.bench_function("introspect_talking_head", |b| {
        b.iter(|| black_box(introspector.introspect(&scene, scene.root())))
    });
}

fn bench_smooth(c: &mut Criterion) {
    c.bench_function("smooth_converge_100", |b| {
        b.iter(|| {
            let mut value = 0.0f32;
            for _ in 0..100 {
                value = smooth(value, black_box(0.35), 0.3);
            }
            value
        })
    });
}

criterion_group!(
    benches,
    bench_frame_speaking,
    bench_frame_idle_no_model,
    bench_introspect,
    bench_smooth
);

criterion_main!(benches);
