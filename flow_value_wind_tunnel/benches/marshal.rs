// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use flow_value::abi::SandboxAbi as _;
use flow_value::loopback::LoopbackSandbox;
use flow_value::registry::FieldDescriptor;
use flow_value::{Boundary, HostValue, Record, TypeDescriptor, TypeRegistry};

/// Entry point for `flow_value` wind-tunnel benchmarks.
///
/// Scenarios isolate the two encoding phases (tree building and serialization) from decoding,
/// over flat arrays and arrays of records.
fn bench_marshal(c: &mut Criterion) {
    bench_encode_int_array(c);
    bench_build_tree_records(c);
    bench_encode_records(c);
    bench_decode_records(c);
}

fn registry() -> TypeRegistry {
    TypeRegistry::new(vec![
        TypeDescriptor::basic("integer"),
        TypeDescriptor::basic("double"),
        TypeDescriptor::basic("string"),
        TypeDescriptor::array("integer"),
        TypeDescriptor::array("string"),
        TypeDescriptor::object(
            "struct:Sample",
            vec![
                FieldDescriptor::new("channel", "string"),
                FieldDescriptor::new("value", "double"),
                FieldDescriptor::new("flags", "array:string"),
            ],
        ),
        TypeDescriptor::array("struct:Sample"),
    ])
}

fn samples(len: usize) -> HostValue {
    HostValue::Array(
        (0..len)
            .map(|i| {
                Record::new()
                    .with("channel", format!("ch{i}"))
                    // Deliberately a string: exercises the numeric coercion.
                    .with("value", format!("{i}.5"))
                    .with("flags", vec![HostValue::from("ok")])
                    .into()
            })
            .collect(),
    )
}

/// Flat integer arrays: one composite, no per-element heap data.
fn bench_encode_int_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_int_array");
    for &len in &[10_usize, 100, 1_000] {
        let mut boundary = Boundary::load(registry());
        let mut sandbox = LoopbackSandbox::new();
        let value = HostValue::Array(
            (0..len)
                .map(|i| HostValue::from(u32::try_from(i).unwrap_or(u32::MAX)))
                .collect(),
        );
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                let encoded = boundary
                    .encoder(&mut sandbox)
                    .encode_as(black_box(&value), "array:integer");
                encoded.release(&mut sandbox);
            });
        });
    }
    group.finish();
}

/// Phase one only: layout and coercion, no sandbox calls.
fn bench_build_tree_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_tree_records");
    for &len in &[10_usize, 100, 1_000] {
        let mut boundary = Boundary::load(registry());
        let mut sandbox = LoopbackSandbox::new();
        let value = samples(len);
        let type_index = boundary
            .registry()
            .type_index_by_name("array:struct:Sample")
            .unwrap_or_default();
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            let encoder = boundary.encoder(&mut sandbox);
            b.iter(|| black_box(encoder.build_tree(type_index, black_box(&value), None)));
        });
    }
    group.finish();
}

/// Both phases, including attach-then-free of every child slot.
fn bench_encode_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_records");
    for &len in &[10_usize, 100, 1_000] {
        let mut boundary = Boundary::load(registry());
        let mut sandbox = LoopbackSandbox::new();
        let value = samples(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                let encoded = boundary
                    .encoder(&mut sandbox)
                    .encode_as(black_box(&value), "array:struct:Sample");
                encoded.release(&mut sandbox);
            });
        });
    }
    group.finish();
}

/// Decoding a resident array of records.
fn bench_decode_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_records");
    for &len in &[10_usize, 100, 1_000] {
        let mut boundary = Boundary::load(registry());
        let mut sandbox = LoopbackSandbox::new();
        let encoded = boundary
            .encoder(&mut sandbox)
            .encode_as(&samples(len), "array:struct:Sample");
        let decoder = boundary.decoder(sandbox.memory());
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| black_box(decoder.read_ptr(black_box(encoded.ptr()))));
        });
        encoded.release(&mut sandbox);
    }
    group.finish();
}

criterion_group!(benches, bench_marshal);
criterion_main!(benches);
