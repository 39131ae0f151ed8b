//! Benchmarks for the analysis pipeline.
//!
//! Runs each stage on a synthetic layered universe:
//! - Relation map construction
//! - Intrinsic detection (parallel and sequential)
//! - Worklist propagation
//! - Descriptor normalization

extern crate secscope;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use secscope::{
    analysis::{Analyzer, IntrinsicDetector, MethodRelationMap, PropagationEngine},
    assembly::Instruction,
    config::{AnalysisConfig, IgnoredCalls},
    descriptor::DescriptorSet,
    metadata::{AssemblyDef, MethodDef, MethodRef, TypeDef, Universe},
};

const LAYERS: usize = 40;
const WIDTH: usize = 50;

/// Builds `LAYERS` types of `WIDTH` methods each; layer 0 is all p/invoke, every other
/// method calls two methods of the layer below. Every type also overrides a shared virtual.
fn layered_universe() -> Universe {
    let mut assembly = AssemblyDef::new("Bench")
        .with_type(TypeDef::class("Bench", "Shape").with_method(MethodDef::new("Draw").as_virtual()));

    for layer in 0..LAYERS {
        let mut ty = TypeDef::class("Bench", &format!("Layer{layer}")).with_base("Bench.Shape");
        for j in 0..WIDTH {
            let method = MethodDef::new(&format!("M{j}"));
            let method = if layer == 0 {
                method.as_pinvoke()
            } else {
                let below = format!("Bench.Layer{}", layer - 1);
                method.body(vec![
                    Instruction::call(0, MethodRef::new(&below, &format!("M{j}"))),
                    Instruction::call(5, MethodRef::new(&below, &format!("M{}", (j + 1) % WIDTH))),
                ])
            };
            ty = ty.with_method(method);
        }
        let mut draw = MethodDef::new("Draw").as_virtual();
        if layer == LAYERS / 2 {
            draw = draw.body(vec![Instruction::call(0, MethodRef::new("Bench.Layer0", "M0"))]);
        }
        assembly = assembly.with_type(ty.with_method(draw));
    }

    Universe::new(vec![assembly])
}

fn bench_relation_map(c: &mut Criterion) {
    let universe = layered_universe();
    let ignored = IgnoredCalls::new();

    c.bench_function("relations_build", |b| {
        b.iter(|| black_box(MethodRelationMap::build(black_box(&universe), &ignored)));
    });
}

fn bench_intrinsic(c: &mut Criterion) {
    let universe = layered_universe();
    let relations = MethodRelationMap::build(&universe, &IgnoredCalls::new());
    let critical = Default::default();

    c.bench_function("intrinsic_parallel", |b| {
        b.iter(|| {
            black_box(IntrinsicDetector::new(&universe, &relations, &critical).detect_all())
        });
    });

    c.bench_function("intrinsic_sequential", |b| {
        b.iter(|| {
            black_box(
                IntrinsicDetector::new(&universe, &relations, &critical)
                    .parallel(false)
                    .detect_all(),
            )
        });
    });
}

fn bench_propagation(c: &mut Criterion) {
    let universe = layered_universe();
    let config = AnalysisConfig::new().resolve(&universe);
    let relations = MethodRelationMap::build(&universe, &config.ignored_calls);
    let intrinsic =
        IntrinsicDetector::new(&universe, &relations, &config.critical_types).detect_all();

    c.bench_function("propagation_run", |b| {
        b.iter(|| {
            let result = PropagationEngine::new(&universe, &relations, &config)
                .run(black_box(&intrinsic))
                .unwrap();
            black_box(result)
        });
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let universe = layered_universe();

    c.bench_function("analyzer_run", |b| {
        b.iter(|| black_box(Analyzer::new(&universe, AnalysisConfig::new()).run().unwrap()));
    });
}

fn bench_normalize(c: &mut Criterion) {
    let universe = layered_universe();
    let analysis = Analyzer::new(&universe, AnalysisConfig::new()).run().unwrap();
    let text = analysis.descriptors().render();
    let overrides = DescriptorSet::parse("!SSC-M: System.Void Bench.Layer1::M0()\n").unwrap();

    c.bench_function("descriptors_parse_merge", |b| {
        b.iter(|| {
            let set = DescriptorSet::parse(black_box(&text)).unwrap();
            black_box(set.merge(&overrides).unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_relation_map,
    bench_intrinsic,
    bench_propagation,
    bench_pipeline,
    bench_normalize
);
criterion_main!(benches);
