// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sandbox allocation ownership across encode and release.

use flow_value::abi::SandboxAbi as _;
use flow_value::loopback::LoopbackSandbox;
use flow_value::registry::FieldDescriptor;
use flow_value::{Boundary, HostValue, Record, TypeDescriptor, TypeRegistry};

fn registry() -> TypeRegistry {
    TypeRegistry::new(vec![
        TypeDescriptor::basic("string"),
        TypeDescriptor::basic("integer"),
        TypeDescriptor::basic("blob"),
        TypeDescriptor::array("string"),
        TypeDescriptor::object(
            "struct:Frame",
            vec![
                FieldDescriptor::new("id", "integer"),
                FieldDescriptor::new("payload", "blob"),
                FieldDescriptor::new("labels", "array:string"),
            ],
        ),
        TypeDescriptor::array("struct:Frame"),
    ])
}

#[test]
fn transient_child_slots_are_freed_after_attach() {
    let mut boundary = Boundary::load(registry());
    let mut sandbox = LoopbackSandbox::new();
    let value = HostValue::Array(vec!["a".into(), "b".into()]);

    let encoded = boundary.encoder(&mut sandbox).encode_as(&value, "array:string");
    // The array slot and header, plus one header and one data buffer per string. No child
    // slot and no staging buffer survives serialization.
    assert_eq!(sandbox.live_allocations(), 6);
    assert_eq!(sandbox.refcount(encoded.ptr()), Some(1));
    encoded.release(&mut sandbox);
    assert_eq!(sandbox.live_allocations(), 0);
}

#[test]
fn releasing_the_root_frees_the_whole_tree() {
    let mut boundary = Boundary::load(registry());
    let mut sandbox = LoopbackSandbox::new();
    let frame = |id: i32| -> HostValue {
        Record::new()
            .with("id", id)
            .with("payload", HostValue::Bytes(vec![1, 2, 3]))
            .with("labels", vec![HostValue::from("x"), HostValue::from("y")])
            .into()
    };
    let value = HostValue::Array((0..16).map(frame).collect());

    for _ in 0..3 {
        let encoded = boundary
            .encoder(&mut sandbox)
            .encode_as(&value, "array:struct:Frame");
        assert!(sandbox.live_allocations() > 0);
        let decoded = boundary.decoder(sandbox.memory()).read_ptr(encoded.ptr());
        assert_eq!(decoded.value, value);
        encoded.release(&mut sandbox);
        assert_eq!(sandbox.live_allocations(), 0);
    }
}

#[test]
fn allocation_failure_degrades_to_null() {
    let mut boundary = Boundary::load(registry());
    // Too small for a 64-element composite, large enough for a null slot.
    let mut sandbox = LoopbackSandbox::with_memory_limit(160);
    let value = HostValue::Array((0..64).map(|i| HostValue::from(format!("s{i}"))).collect());

    let encoded = boundary.encoder(&mut sandbox).encode_as(&value, "array:string");
    let decoded = boundary.decoder(sandbox.memory()).read_ptr(encoded.ptr());
    assert_eq!(decoded.value, HostValue::Null);
    encoded.release(&mut sandbox);
    assert_eq!(sandbox.live_allocations(), 0);
}

#[test]
fn failed_blob_value_frees_its_buffer() {
    let mut boundary = Boundary::load(registry());
    // The buffer and the blob header fit; the blob slot does not. Once both are released, a
    // null slot fits in the header's place.
    let mut sandbox = LoopbackSandbox::with_memory_limit(48);
    let encoded = boundary
        .encoder(&mut sandbox)
        .encode(&HostValue::Bytes(vec![1; 8]));
    assert!(!encoded.ptr().is_null());
    assert_eq!(sandbox.live_allocations(), 1);
    let decoded = boundary.decoder(sandbox.memory()).read_ptr(encoded.ptr());
    assert_eq!(decoded.value, HostValue::Null);
    encoded.release(&mut sandbox);
    assert_eq!(sandbox.live_allocations(), 0);

    // Only the buffer fits. Nothing is left behind, not even a null slot.
    let mut sandbox = LoopbackSandbox::with_memory_limit(24);
    let encoded = boundary
        .encoder(&mut sandbox)
        .encode(&HostValue::Bytes(vec![1; 8]));
    assert!(encoded.ptr().is_null());
    assert_eq!(sandbox.live_allocations(), 0);
    encoded.release(&mut sandbox);
    assert_eq!(sandbox.live_allocations(), 0);
}

#[test]
fn failed_string_value_degrades_to_null() {
    let mut boundary = Boundary::load(registry());
    let mut sandbox = LoopbackSandbox::with_memory_limit(48);
    let encoded = boundary.encoder(&mut sandbox).encode(&HostValue::from("abcdefg"));
    let decoded = boundary.decoder(sandbox.memory()).read_ptr(encoded.ptr());
    assert_eq!(decoded.value, HostValue::Null);
    assert_eq!(sandbox.live_allocations(), 1);
    encoded.release(&mut sandbox);
    assert_eq!(sandbox.live_allocations(), 0);
}
