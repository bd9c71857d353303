//! Benchmarks for constant protection.
//!
//! Tests throughput of the hot paths:
//! - Key derivation per level and iteration
//! - Payload encoding and decoding for 32-bit and 64-bit tables
//! - A full engine run over a unit with arrays, scalars and promotable locals

extern crate obscura;

use criterion::{criterion_group, criterion_main, Criterion};
use obscura::{
    config::Level,
    encryption::{transform, KeySchedule},
    ir::{pack_values, Function, GlobalVar, LocalVar, Module, ScalarType, Value},
    EngineConfig, FlagSet, ObfuscationEngine,
};
use std::hint::black_box;

/// Benchmark deriving fifteen Deep iteration keys.
fn bench_key_derivation(c: &mut Criterion) {
    let schedule = KeySchedule::new(0x5EED, "bench.c");

    c.bench_function("derive_deep_x15", |b| {
        b.iter(|| black_box(schedule.derive_level(black_box("table"), Level::Deep, 15)));
    });
}

/// Benchmark encoding and decoding a 4 KiB table of 32-bit integers.
fn bench_payload_i32(c: &mut Criterion) {
    let schedule = KeySchedule::new(0x5EED, "bench.c");
    let lite = schedule.derive_level("table", Level::Lite, 3);
    let deep = schedule.derive_level("table", Level::Deep, 3);
    let values: Vec<Value> = (0..1024).map(Value::i32).collect();
    let plain = pack_values(&values);
    let cipher = transform::encode_payload(ScalarType::I32, &plain, &lite, &deep).unwrap();

    c.bench_function("encode_i32_x1024", |b| {
        b.iter(|| {
            let out =
                transform::encode_payload(ScalarType::I32, black_box(&plain), &lite, &deep).unwrap();
            black_box(out)
        });
    });

    c.bench_function("decode_i32_x1024", |b| {
        b.iter(|| {
            let out =
                transform::decode_payload(ScalarType::I32, black_box(&cipher), &lite, &deep).unwrap();
            black_box(out)
        });
    });
}

/// Benchmark encoding a table of doubles.
fn bench_payload_f64(c: &mut Criterion) {
    let schedule = KeySchedule::new(1, "bench.c");
    let deep = schedule.derive_level("weights", Level::Deep, 1);
    let values: Vec<Value> = (0..512).map(|i| Value::f64(f64::from(i) * 0.5)).collect();
    let plain = pack_values(&values);

    c.bench_function("encode_f64_x512", |b| {
        b.iter(|| {
            let out =
                transform::encode_payload(ScalarType::F64, black_box(&plain), &[], &deep).unwrap();
            black_box(out)
        });
    });
}

fn unit() -> Module {
    let mut module = Module::new("bench.c");
    module.add_policy_marker();
    let values: Vec<Value> = (0..256).map(Value::i32).collect();
    let table = module.add_global(GlobalVar::array("table", ScalarType::I32, &values));
    for i in 0..32 {
        let key = module.add_global(GlobalVar::scalar(format!("key{i}"), Value::i64(i)));
        let mut function = Function::new(format!("f{i}")).with_params(vec![ScalarType::I32]);
        let local = function.add_local(LocalVar::scalar("limit", Value::i32(100)));
        let index = function.arg(0);
        let _ = function.load_element(table, index);
        let _ = function.load_local(local);
        let value = function.load_global(key);
        function.ret(Some(value));
        module.add_function(function);
    }
    module
}

/// Benchmark a full engine run with promotion and both levels.
fn bench_engine_unit(c: &mut Criterion) {
    let engine = ObfuscationEngine::new(EngineConfig::default().with_parallel(false));
    let flags = FlagSet::from_defines(["ENC_FULL", "ENC_FULL_TIMES=2", "L2G_ENABLE", "L2G_DEDUP"]);
    let template = unit();

    c.bench_function("engine_unit_32_functions", |b| {
        b.iter(|| {
            let mut module = template.clone();
            let result = engine.process_unit(&mut module, black_box(&flags)).unwrap();
            black_box(result)
        });
    });
}

criterion_group!(
    benches,
    bench_key_derivation,
    bench_payload_i32,
    bench_payload_f64,
    bench_engine_unit
);
criterion_main!(benches);
