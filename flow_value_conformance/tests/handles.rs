// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stream handle assignment and reverse lookup.

use flow_value::abi::SandboxAbi as _;
use flow_value::loopback::LoopbackSandbox;
use flow_value::{
    Decoder, Encoder, HandleTable, HostRef, HostValue, Tag, Tagged, TypeRegistry, ValueType,
};

struct Stream {
    name: &'static str,
}

/// Encodes `stream` and returns the handle written into its slot.
fn encode_stream(
    sandbox: &mut LoopbackSandbox,
    registry: &TypeRegistry,
    handles: &mut HandleTable,
    stream: &HostRef,
) -> u32 {
    let encoded =
        Encoder::new(sandbox, registry, handles).encode(&HostValue::Stream(stream.clone()));
    let at = encoded.ptr().addr() as usize;
    let memory = sandbox.memory();
    assert_eq!(Tag::from_u8(memory[at]), Some(Tag::StreamHandle));
    let handle = u32::from_le_bytes(memory[at + 8..at + 12].try_into().unwrap());
    encoded.release(sandbox);
    handle
}

#[test]
fn same_identity_same_handle_until_clear() {
    let registry = TypeRegistry::default();
    let mut handles = HandleTable::new();
    let mut sandbox = LoopbackSandbox::new();
    let a = HostRef::new(Stream { name: "a" });
    let b = HostRef::new(Stream { name: "b" });

    assert_eq!(encode_stream(&mut sandbox, &registry, &mut handles, &a), 0);
    assert_eq!(encode_stream(&mut sandbox, &registry, &mut handles, &b), 1);
    assert_eq!(encode_stream(&mut sandbox, &registry, &mut handles, &a.clone()), 0);
    assert_eq!(handles.len(), 2);

    handles.clear();
    assert!(handles.is_empty());
    assert_eq!(encode_stream(&mut sandbox, &registry, &mut handles, &b), 0);
    assert_eq!(encode_stream(&mut sandbox, &registry, &mut handles, &a), 1);
    assert_eq!(sandbox.live_allocations(), 0);
}

#[test]
fn equal_contents_are_distinct_identities() {
    let registry = TypeRegistry::default();
    let mut handles = HandleTable::new();
    let mut sandbox = LoopbackSandbox::new();
    let a = HostRef::new(Stream { name: "same" });
    let b = HostRef::new(Stream { name: "same" });

    let ha = encode_stream(&mut sandbox, &registry, &mut handles, &a);
    let hb = encode_stream(&mut sandbox, &registry, &mut handles, &b);
    assert_ne!(ha, hb);
}

#[test]
fn streams_decode_to_the_same_identity() {
    let registry = TypeRegistry::default();
    let mut handles = HandleTable::new();
    let mut sandbox = LoopbackSandbox::new();
    let stream = HostRef::new(Stream { name: "serial" });

    let encoded = Encoder::new(&mut sandbox, &registry, &mut handles)
        .encode(&HostValue::Stream(stream.clone()));
    let decoded = Decoder::new(sandbox.memory(), &registry, &handles).read_ptr(encoded.ptr());
    assert_eq!(
        decoded,
        Tagged::new(HostValue::Stream(stream.clone()), ValueType::Stream)
    );
    let HostValue::Stream(back) = &decoded.value else {
        panic!("expected a stream");
    };
    assert_eq!(back.downcast_ref::<Stream>().map(|s| s.name), Some("serial"));

    // A handle this table never issued decodes as undefined.
    handles.clear();
    let decoded = Decoder::new(sandbox.memory(), &registry, &handles).read_ptr(encoded.ptr());
    assert!(decoded.is_undefined());
    encoded.release(&mut sandbox);
}
