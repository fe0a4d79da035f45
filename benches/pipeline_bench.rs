//! Benchmarks for pipeline construction and validation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flowforge::components::{StringSink, StringSource, Uppercase};
use flowforge::pipeline::Pipeline;

fn build_pipeline(stages: usize) -> Pipeline {
    let mut p = Pipeline::new("bench");
    p.add_component("src", StringSource::new("hello"));
    for i in 0..stages {
        p.add_component(format!("upper{i}"), Uppercase::new());
    }
    p.add_component("sink", StringSink::new());

    p.connect::<String>("src", "output", "upper0", "input");
    for i in 1..stages {
        p.connect::<String>(&format!("upper{}", i - 1), "output", &format!("upper{i}"), "input");
    }
    p.connect::<String>(&format!("upper{}", stages - 1), "output", "sink", "input");
    p
}

fn pipeline_benchmark(c: &mut Criterion) {
    c.bench_function("build_10_stages", |b| {
        b.iter(|| black_box(build_pipeline(10)))
    });

    let p = build_pipeline(10);
    c.bench_function("validate_10_stages", |b| {
        b.iter(|| black_box(p.validate_comprehensive()))
    });

    c.bench_function("topology_order_10_stages", |b| {
        b.iter(|| black_box(p.topology_order().unwrap()))
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
