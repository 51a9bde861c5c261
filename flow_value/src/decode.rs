// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sandbox → host decoding.
//!
//! The decoder only reads. It never adjusts refcounts or frees anything; the memory it inspects
//! stays owned by the sandbox runtime.
//!
//! Decoding is total: unknown tags, out-of-bounds pointers, unknown type indices and runaway
//! nesting are logged and produce the [`Tagged::undefined`] sentinel. Filtering a composite out
//! with an expected-type list also produces the sentinel, silently.

use alloc::vec::Vec;

use chrono::DateTime;

use crate::abi::SandboxPtr;
use crate::handles::{HandleTable, StreamHandle};
use crate::host::{HostValue, Record, Tagged, ValueType};
use crate::layout::{
    ARRAY_REF_COMPOSITE_OFFSET, COMPOSITE_HEADER_SIZE, COMPOSITE_TYPE_OFFSET, PAYLOAD_OFFSET,
    REF_DATA_OFFSET, REF_LEN_OFFSET, SLOT_SIZE, element_addr,
};
use crate::registry::{TypeDescriptor, TypeRef, TypeRegistry};
use crate::tag::Tag;
use crate::view::{HeapView, MemoryError};

/// Decoder limits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Deepest composite nesting followed before giving up on a value.
    pub max_depth: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// Reads tagged values out of sandbox memory.
#[derive(Debug)]
pub struct Decoder<'a> {
    heap: HeapView<'a>,
    registry: &'a TypeRegistry,
    handles: &'a HandleTable,
    config: DecoderConfig,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over a snapshot of sandbox memory.
    #[must_use]
    pub fn new(memory: &'a [u8], registry: &'a TypeRegistry, handles: &'a HandleTable) -> Self {
        Self {
            heap: HeapView::new(memory),
            registry,
            handles,
            config: DecoderConfig::default(),
        }
    }

    /// Replaces the decoder limits.
    #[must_use]
    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Decodes the value slot at `addr`.
    #[must_use]
    pub fn read_value(&self, addr: u32) -> Tagged {
        self.value_at(addr, 0)
    }

    /// Decodes the value slot at `ptr`.
    #[must_use]
    pub fn read_ptr(&self, ptr: SandboxPtr) -> Tagged {
        self.read_value(ptr.addr())
    }

    /// Decodes the composite (header plus slots) at `addr`.
    ///
    /// With `expected_types`, a sequence is only decoded if some entry starts with `array:`, and
    /// a record only if its type's symbolic name is listed. Otherwise the sentinel is returned
    /// without reading any element.
    #[must_use]
    pub fn read_composite(&self, addr: u32, expected_types: Option<&[&str]>) -> Tagged {
        self.composite_at(addr, expected_types, 0)
    }

    fn value_at(&self, addr: u32, depth: usize) -> Tagged {
        self.try_value_at(addr, depth).unwrap_or_else(|err| {
            tracing::error!(addr, %err, "failed to read sandbox value");
            Tagged::undefined()
        })
    }

    fn composite_at(&self, addr: u32, expected: Option<&[&str]>, depth: usize) -> Tagged {
        self.try_composite_at(addr, expected, depth)
            .unwrap_or_else(|err| {
                tracing::error!(addr, %err, "failed to read sandbox composite");
                Tagged::undefined()
            })
    }

    fn try_value_at(&self, addr: u32, depth: usize) -> Result<Tagged, MemoryError> {
        let heap = &self.heap;
        let raw = heap.u8(addr)?;
        let Some(tag) = Tag::from_u8(raw) else {
            tracing::error!(tag = raw, addr, "unknown value tag from sandbox");
            return Ok(Tagged::undefined());
        };
        let payload = offset(addr, PAYLOAD_OFFSET)?;
        Ok(match tag {
            Tag::Undefined => Tagged::undefined(),
            Tag::Null => Tagged::new(HostValue::Null, ValueType::Null),
            Tag::Boolean => Tagged::new(
                HostValue::Bool(heap.i32(payload)? != 0),
                ValueType::Boolean,
            ),
            Tag::Int8 => integer(f64::from(heap.i8(payload)?)),
            Tag::Uint8 => integer(f64::from(heap.u8(payload)?)),
            Tag::Int16 => integer(f64::from(heap.i16(payload)?)),
            Tag::Uint16 => integer(f64::from(heap.u16(payload)?)),
            Tag::Int32 => integer(f64::from(heap.i32(payload)?)),
            Tag::Uint32 => integer(f64::from(heap.u32(payload)?)),
            // 64-bit integers only carry their low word across; the high word is not read.
            Tag::Int64 => integer(f64::from(heap.i32(payload)?)),
            Tag::Uint64 => integer(f64::from(heap.u32(payload)?)),
            Tag::Float32 => Tagged::new(
                HostValue::Number(f64::from(heap.f32(payload)?)),
                ValueType::Float,
            ),
            Tag::Float64 => Tagged::new(HostValue::Number(heap.f64(payload)?), ValueType::Double),
            Tag::StringInline => string(heap.c_str(heap.u32(payload)?)?),
            Tag::StringAssetRelative => {
                string(heap.c_str(relative(payload, heap.i32(payload)?)?)?)
            }
            Tag::StringRef => {
                let header = heap.u32(payload)?;
                string(heap.c_str(heap.u32(offset(header, REF_DATA_OFFSET)?)?)?)
            }
            Tag::ArrayInline => self.nested(heap.u32(payload)?, depth),
            Tag::ArrayAssetRelative => {
                self.nested(relative(payload, heap.i32(payload)?)?, depth)
            }
            Tag::ArrayRef => {
                let header = heap.u32(payload)?;
                self.nested(offset(header, ARRAY_REF_COMPOSITE_OFFSET)?, depth)
            }
            Tag::BlobRef => {
                let header = heap.u32(payload)?;
                let data = heap.u32(offset(header, REF_DATA_OFFSET)?)?;
                let len = heap.u32(offset(header, REF_LEN_OFFSET)?)?;
                Tagged::new(
                    HostValue::Bytes(heap.bytes(data, len)?.to_vec()),
                    ValueType::Blob,
                )
            }
            Tag::StreamHandle => {
                let handle = StreamHandle::new(heap.u32(payload)?);
                match self.handles.stream_for(handle) {
                    Some(stream) => Tagged::new(HostValue::Stream(stream.clone()), ValueType::Stream),
                    None => {
                        tracing::warn!(
                            handle = handle.as_u32(),
                            "stream handle was not issued by this table"
                        );
                        Tagged::undefined()
                    }
                }
            }
            Tag::Date => date(heap.f64(payload)?),
            Tag::Pointer => integer(f64::from(heap.u32(payload)?)),
        })
    }

    fn nested(&self, composite: u32, depth: usize) -> Tagged {
        self.composite_at(composite, None, depth + 1)
    }

    fn try_composite_at(
        &self,
        addr: u32,
        expected: Option<&[&str]>,
        depth: usize,
    ) -> Result<Tagged, MemoryError> {
        if depth > self.config.max_depth {
            tracing::error!(
                addr,
                max_depth = self.config.max_depth,
                "composite nesting too deep"
            );
            return Ok(Tagged::undefined());
        }
        let count = self.heap.u32(addr)?;
        let type_index = self.heap.u32(offset(addr, COMPOSITE_TYPE_OFFSET)?)?;
        let Some(ty) = self.registry.resolve(type_index) else {
            tracing::error!(addr, type_index, "composite references an unknown type");
            return Ok(Tagged::undefined());
        };
        match ty {
            TypeDescriptor::Basic { value_type: element }
            | TypeDescriptor::Array {
                element_type: TypeRef { value_type: element },
                ..
            } => {
                if let Some(expected) = expected
                    && !expected.iter().any(|t| t.starts_with("array:"))
                {
                    return Ok(Tagged::undefined());
                }
                self.check_slots(addr, count)?;
                let mut items = Vec::with_capacity(count as usize);
                for index in 0..count {
                    let slot = element_addr(addr, index).ok_or(MemoryError::AddressOverflow)?;
                    items.push(self.value_at(slot, depth).value);
                }
                Ok(Tagged::new(
                    HostValue::Array(items),
                    ValueType::Array(element.clone()),
                ))
            }
            TypeDescriptor::Object { value_type, fields } => {
                if let Some(expected) = expected
                    && !expected.contains(&value_type.as_str())
                {
                    return Ok(Tagged::undefined());
                }
                let available = fields.len().min(count as usize);
                self.check_slots(addr, u32::try_from(available).unwrap_or(u32::MAX))?;
                if available < fields.len() {
                    tracing::error!(
                        type_name = %value_type,
                        element_count = count,
                        field_count = fields.len(),
                        "record has fewer elements than its type has fields"
                    );
                }
                let mut record = Record::with_capacity(available);
                for (index, field) in (0..).zip(&fields[..available]) {
                    let slot = element_addr(addr, index).ok_or(MemoryError::AddressOverflow)?;
                    record.insert(field.name.clone(), self.value_at(slot, depth).value);
                }
                Ok(Tagged::new(
                    HostValue::Record(record),
                    ValueType::Named(value_type.clone()),
                ))
            }
        }
    }

    /// Fails unless all `count` slots of the composite at `addr` lie inside memory.
    fn check_slots(&self, addr: u32, count: u32) -> Result<(), MemoryError> {
        let first = offset(addr, COMPOSITE_HEADER_SIZE)?;
        let len = count
            .checked_mul(SLOT_SIZE)
            .ok_or(MemoryError::AddressOverflow)?;
        self.heap.bytes(first, len).map(|_| ())
    }
}

fn offset(addr: u32, by: u32) -> Result<u32, MemoryError> {
    addr.checked_add(by).ok_or(MemoryError::AddressOverflow)
}

/// Asset-relative pointers are stored relative to the payload word that holds them.
fn relative(payload: u32, rel: i32) -> Result<u32, MemoryError> {
    payload
        .checked_add_signed(rel)
        .ok_or(MemoryError::AddressOverflow)
}

fn integer(n: f64) -> Tagged {
    Tagged::new(HostValue::Number(n), ValueType::Integer)
}

fn string(s: alloc::string::String) -> Tagged {
    Tagged::new(HostValue::String(s), ValueType::String)
}

#[expect(clippy::cast_possible_truncation, reason = "dates truncate toward zero")]
fn date(millis: f64) -> Tagged {
    let parsed = if millis.is_finite() {
        DateTime::from_timestamp_millis(millis as i64)
    } else {
        None
    };
    match parsed {
        Some(date) => Tagged::new(HostValue::Date(date), ValueType::Date),
        None => {
            tracing::warn!(millis, "date out of range");
            Tagged::undefined()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldDescriptor;
    use alloc::vec;

    fn slot(mem: &mut [u8], addr: usize, tag: Tag, payload: &[u8]) {
        mem[addr] = tag.as_u8();
        mem[addr + 8..addr + 8 + payload.len()].copy_from_slice(payload);
    }

    fn registry() -> TypeRegistry {
        TypeRegistry::new(vec![
            TypeDescriptor::basic("integer"),
            TypeDescriptor::array("integer"),
            TypeDescriptor::object(
                "struct:Pair",
                vec![
                    FieldDescriptor::new("a", "integer"),
                    FieldDescriptor::new("b", "integer"),
                ],
            ),
        ])
    }

    #[test]
    fn scalar_tags() {
        let r = registry();
        let handles = HandleTable::new();
        let mut mem = vec![0_u8; 256];
        slot(&mut mem, 0, Tag::Int8, &(-3_i8).to_le_bytes());
        slot(&mut mem, 16, Tag::Uint16, &65_535_u16.to_le_bytes());
        slot(&mut mem, 32, Tag::Int64, &(-5_i64).to_le_bytes());
        slot(&mut mem, 48, Tag::Uint64, &((1_u64 << 32) | 9).to_le_bytes());
        slot(&mut mem, 64, Tag::Float32, &1.5_f32.to_le_bytes());
        slot(&mut mem, 80, Tag::Pointer, &0xbeef_u32.to_le_bytes());
        slot(&mut mem, 96, Tag::Boolean, &2_i32.to_le_bytes());
        slot(&mut mem, 128, Tag::Uint8, &200_u8.to_le_bytes());
        slot(&mut mem, 144, Tag::Int16, &(-300_i16).to_le_bytes());
        slot(&mut mem, 160, Tag::Uint32, &0xffff_ffff_u32.to_le_bytes());
        slot(&mut mem, 176, Tag::Int32, &i32::MIN.to_le_bytes());
        slot(&mut mem, 192, Tag::Float64, &(-0.25_f64).to_le_bytes());
        let d = Decoder::new(&mem, &r, &handles);

        assert_eq!(d.read_value(0), integer(-3.0));
        assert_eq!(d.read_value(16), integer(65_535.0));
        assert_eq!(d.read_value(32), integer(-5.0));
        // The high word of a 64-bit integer is dropped.
        assert_eq!(d.read_value(48), integer(9.0));
        assert_eq!(
            d.read_value(64),
            Tagged::new(HostValue::Number(1.5), ValueType::Float)
        );
        assert_eq!(d.read_value(80), integer(f64::from(0xbeef_u32)));
        assert_eq!(d.read_value(96).value, HostValue::Bool(true));
        assert!(d.read_value(112).is_undefined());
        assert_eq!(d.read_value(128), integer(200.0));
        assert_eq!(d.read_value(144), integer(-300.0));
        assert_eq!(d.read_value(160), integer(4_294_967_295.0));
        assert_eq!(d.read_value(176), integer(f64::from(i32::MIN)));
        assert_eq!(
            d.read_value(192),
            Tagged::new(HostValue::Number(-0.25), ValueType::Double)
        );
    }

    #[test]
    fn basic_kind_composite_is_a_sequence() {
        let r = registry();
        let handles = HandleTable::new();
        let mut mem = vec![0_u8; 64];
        // Two elements typed by the basic `integer` descriptor; the second is left undefined.
        mem[0..4].copy_from_slice(&2_u32.to_le_bytes());
        mem[4..8].copy_from_slice(&0_u32.to_le_bytes());
        slot(&mut mem, 8, Tag::Int32, &4_i32.to_le_bytes());
        let d = Decoder::new(&mem, &r, &handles);

        let expected = Tagged::new(
            HostValue::Array(vec![4.into(), HostValue::Undefined]),
            ValueType::Array("integer".into()),
        );
        assert_eq!(d.read_composite(0, None), expected);
        assert_eq!(d.read_composite(0, Some(&["array:x"])), expected);
        assert!(d.read_composite(0, Some(&["integer"])).is_undefined());
    }

    #[test]
    fn inline_and_relative_strings() {
        let r = registry();
        let handles = HandleTable::new();
        let mut mem = vec![0_u8; 256];
        mem[128..131].copy_from_slice(b"abc");
        slot(&mut mem, 0, Tag::StringInline, &128_u32.to_le_bytes());
        // Relative to the payload word at 24: 24 + 104 = 128.
        slot(&mut mem, 16, Tag::StringAssetRelative, &104_i32.to_le_bytes());
        // Relative offsets may be negative.
        mem[4..7].copy_from_slice(b"neg");
        slot(&mut mem, 48, Tag::StringAssetRelative, &(-52_i32).to_le_bytes());
        let d = Decoder::new(&mem, &r, &handles);

        assert_eq!(d.read_value(0), string("abc".into()));
        assert_eq!(d.read_value(16), string("abc".into()));
        assert_eq!(d.read_value(48), string("neg".into()));
    }

    #[test]
    fn inline_and_relative_arrays() {
        let r = registry();
        let handles = HandleTable::new();
        let mut mem = vec![0_u8; 256];
        // Composite at 64: two int32 elements typed `array:integer`.
        mem[64..68].copy_from_slice(&2_u32.to_le_bytes());
        mem[68..72].copy_from_slice(&1_u32.to_le_bytes());
        slot(&mut mem, 72, Tag::Int32, &10_i32.to_le_bytes());
        slot(&mut mem, 88, Tag::Int32, &20_i32.to_le_bytes());
        slot(&mut mem, 0, Tag::ArrayInline, &64_u32.to_le_bytes());
        slot(&mut mem, 16, Tag::ArrayAssetRelative, &40_i32.to_le_bytes());
        let d = Decoder::new(&mem, &r, &handles);

        let expected = Tagged::new(
            HostValue::Array(vec![10.into(), 20.into()]),
            ValueType::Array("integer".into()),
        );
        assert_eq!(d.read_value(0), expected);
        assert_eq!(d.read_value(16), expected);
    }

    #[test]
    fn unknown_tag_and_bad_pointers_are_undefined() {
        let r = registry();
        let handles = HandleTable::new();
        let mut mem = vec![0_u8; 64];
        mem[0] = 200;
        slot(&mut mem, 16, Tag::StringInline, &0xffff_u32.to_le_bytes());
        slot(&mut mem, 32, Tag::StreamHandle, &3_u32.to_le_bytes());
        let d = Decoder::new(&mem, &r, &handles);

        assert!(d.read_value(0).is_undefined());
        assert!(d.read_value(16).is_undefined());
        assert!(d.read_value(32).is_undefined());
        assert!(d.read_value(1_000).is_undefined());
    }

    #[test]
    fn composite_with_unknown_type_is_undefined() {
        let r = registry();
        let handles = HandleTable::new();
        let mut mem = vec![0_u8; 64];
        mem[4..8].copy_from_slice(&9_u32.to_le_bytes());
        let d = Decoder::new(&mem, &r, &handles);
        assert!(d.read_composite(0, None).is_undefined());
    }

    #[test]
    fn self_referencing_composite_stops_at_max_depth() {
        let r = registry();
        let handles = HandleTable::new();
        let mut mem = vec![0_u8; 64];
        // A one-element `array:integer` whose element points back at the composite itself.
        mem[0..4].copy_from_slice(&1_u32.to_le_bytes());
        mem[4..8].copy_from_slice(&1_u32.to_le_bytes());
        slot(&mut mem, 8, Tag::ArrayInline, &0_u32.to_le_bytes());
        let d = Decoder::new(&mem, &r, &handles).with_config(DecoderConfig { max_depth: 4 });

        let mut value = d.read_composite(0, None).value;
        let mut depth = 0;
        while let HostValue::Array(mut items) = value {
            value = items.pop().unwrap_or_default();
            depth += 1;
        }
        assert_eq!(depth, 5);
        assert_eq!(value, HostValue::Undefined);
    }
}
