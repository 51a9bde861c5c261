// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An in-process sandbox speaking the value ABI.
//!
//! [`LoopbackSandbox`] implements [`SandboxAbi`] over a `Vec`-backed linear memory with the same
//! slot, composite and reference-header layout as the real runtime, including refcounted
//! sharing. It is what the conformance tests and benchmarks encode into, and it doubles as a
//! host-side stand-in when no guest module is loaded.
//!
//! Allocation is a bump pointer with exact-size free lists. Every live block is tracked, so
//! callers can assert that a sequence of encode/release calls leaves nothing behind.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::abi::{SandboxAbi, SandboxPtr};
use crate::layout::{
    ARRAY_REF_COMPOSITE_OFFSET, COMPOSITE_TYPE_OFFSET, PAYLOAD_OFFSET, REF_COUNT_OFFSET,
    REF_DATA_OFFSET, REF_HEADER_SIZE, REF_LEN_OFFSET, SLOT_SIZE, composite_size, element_addr,
};
use crate::tag::Tag;
use crate::view::HeapView;

const HEAP_BASE: u32 = 16;
const ALIGN: u32 = 8;
const DEFAULT_LIMIT: u32 = 16 << 20;

/// A reference implementation of the sandbox side of the value ABI.
#[derive(Clone, Debug)]
pub struct LoopbackSandbox {
    memory: Vec<u8>,
    limit: u32,
    top: u32,
    free_lists: BTreeMap<u32, Vec<u32>>,
    live: BTreeMap<u32, u32>,
}

impl Default for LoopbackSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackSandbox {
    /// Creates a sandbox with a 16 MiB memory limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_memory_limit(DEFAULT_LIMIT)
    }

    /// Creates a sandbox whose linear memory never grows past `limit` bytes.
    #[must_use]
    pub fn with_memory_limit(limit: u32) -> Self {
        Self {
            memory: alloc::vec![0; HEAP_BASE as usize],
            limit,
            top: HEAP_BASE,
            free_lists: BTreeMap::new(),
            live: BTreeMap::new(),
        }
    }

    /// Number of blocks currently allocated.
    #[must_use]
    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }

    /// Bytes currently allocated, rounded to the allocation granule.
    #[must_use]
    pub fn live_bytes(&self) -> u64 {
        self.live.values().map(|&size| u64::from(size)).sum()
    }

    /// Refcount of the header behind a `*-ref` slot.
    #[must_use]
    pub fn refcount(&self, slot: SandboxPtr) -> Option<u32> {
        let tag = Tag::from_u8(self.view().u8(slot.addr()).ok()?)?;
        if !tag.is_ref() {
            return None;
        }
        let header = self.load_u32(slot.addr() + PAYLOAD_OFFSET);
        self.view().u32(header + REF_COUNT_OFFSET).ok()
    }

    /// Writes raw bytes into linear memory; returns `false` if they do not fit.
    pub fn write(&mut self, addr: u32, bytes: &[u8]) -> bool {
        let start = addr as usize;
        match self.memory.get_mut(start..start + bytes.len()) {
            Some(dst) => {
                dst.copy_from_slice(bytes);
                true
            }
            None => false,
        }
    }

    fn view(&self) -> HeapView<'_> {
        HeapView::new(&self.memory)
    }

    fn load_u32(&self, addr: u32) -> u32 {
        self.view().u32(addr).unwrap_or(0)
    }

    fn store_u32(&mut self, addr: u32, value: u32) {
        self.write(addr, &value.to_le_bytes());
    }

    fn alloc(&mut self, size: u32) -> SandboxPtr {
        let Some(size) = size.max(1).checked_next_multiple_of(ALIGN) else {
            return SandboxPtr::NULL;
        };
        let reused = self.free_lists.get_mut(&size).and_then(Vec::pop);
        let addr = match reused {
            Some(addr) => addr,
            None => {
                let Some(end) = self.top.checked_add(size).filter(|&end| end <= self.limit) else {
                    tracing::warn!(size, limit = self.limit, "loopback sandbox out of memory");
                    return SandboxPtr::NULL;
                };
                let addr = self.top;
                self.top = end;
                if self.memory.len() < end as usize {
                    self.memory.resize(end as usize, 0);
                }
                addr
            }
        };
        self.memory[addr as usize..(addr + size) as usize].fill(0);
        self.live.insert(addr, size);
        SandboxPtr(addr)
    }

    fn new_slot(&mut self, tag: Tag, payload: &[u8]) -> SandboxPtr {
        let slot = self.alloc(SLOT_SIZE);
        if !slot.is_null() {
            self.memory[slot.addr() as usize] = tag.as_u8();
            self.write(slot.addr() + PAYLOAD_OFFSET, payload);
        }
        slot
    }

    /// Allocates a refcount-1 header for `data` and a slot pointing at it.
    fn new_ref(&mut self, tag: Tag, data: SandboxPtr, len: u32) -> SandboxPtr {
        let header = self.alloc(REF_HEADER_SIZE);
        if header.is_null() {
            return SandboxPtr::NULL;
        }
        self.store_u32(header.addr() + REF_COUNT_OFFSET, 1);
        self.store_u32(header.addr() + REF_DATA_OFFSET, data.addr());
        self.store_u32(header.addr() + REF_LEN_OFFSET, len);
        let slot = self.new_slot(tag, &header.addr().to_le_bytes());
        if slot.is_null() {
            self.free(header);
        }
        slot
    }

    fn is_live(&self, ptr: SandboxPtr) -> bool {
        self.live.contains_key(&ptr.addr())
    }

    fn slot_tag(&self, slot: u32) -> Option<Tag> {
        self.view().u8(slot).ok().and_then(Tag::from_u8)
    }

    fn retain_contents(&mut self, slot: u32) {
        if !self.slot_tag(slot).is_some_and(Tag::is_ref) {
            return;
        }
        let header = self.load_u32(slot + PAYLOAD_OFFSET);
        let count = self.load_u32(header + REF_COUNT_OFFSET);
        self.store_u32(header + REF_COUNT_OFFSET, count + 1);
    }

    fn release_contents(&mut self, slot: u32) {
        let Some(tag) = self.slot_tag(slot).filter(|t| t.is_ref()) else {
            return;
        };
        let header = self.load_u32(slot + PAYLOAD_OFFSET);
        let count = self.load_u32(header + REF_COUNT_OFFSET);
        if count > 1 {
            self.store_u32(header + REF_COUNT_OFFSET, count - 1);
            return;
        }
        if tag == Tag::ArrayRef {
            let composite = header + ARRAY_REF_COMPOSITE_OFFSET;
            for index in 0..self.load_u32(composite) {
                if let Some(element) = element_addr(composite, index) {
                    self.release_contents(element);
                }
            }
        } else {
            let data = self.load_u32(header + REF_DATA_OFFSET);
            self.free(SandboxPtr(data));
        }
        self.free(SandboxPtr(header));
    }
}

impl SandboxAbi for LoopbackSandbox {
    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn malloc(&mut self, size: u32) -> SandboxPtr {
        self.alloc(size)
    }

    fn free(&mut self, ptr: SandboxPtr) {
        if ptr.is_null() {
            return;
        }
        match self.live.remove(&ptr.addr()) {
            Some(size) => self.free_lists.entry(size).or_default().push(ptr.addr()),
            None => tracing::error!(addr = ptr.addr(), "free of an unallocated pointer"),
        }
    }

    fn allocate_utf8(&mut self, s: &str) -> SandboxPtr {
        let Ok(len) = u32::try_from(s.len()) else {
            return SandboxPtr::NULL;
        };
        let Some(size) = len.checked_add(1) else {
            return SandboxPtr::NULL;
        };
        let ptr = self.alloc(size);
        if !ptr.is_null() {
            self.write(ptr.addr(), s.as_bytes());
        }
        ptr
    }

    fn create_undefined_value(&mut self) -> SandboxPtr {
        self.new_slot(Tag::Undefined, &[])
    }

    fn create_null_value(&mut self) -> SandboxPtr {
        self.new_slot(Tag::Null, &[])
    }

    fn create_boolean_value(&mut self, value: bool) -> SandboxPtr {
        self.new_slot(Tag::Boolean, &i32::from(value).to_le_bytes())
    }

    fn create_int_value(&mut self, value: i32) -> SandboxPtr {
        self.new_slot(Tag::Int32, &value.to_le_bytes())
    }

    fn create_double_value(&mut self, value: f64) -> SandboxPtr {
        self.new_slot(Tag::Float64, &value.to_le_bytes())
    }

    fn create_string_value(&mut self, utf8: SandboxPtr) -> SandboxPtr {
        let s = match self.view().c_str(utf8.addr()) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(addr = utf8.addr(), %err, "bad string buffer");
                return SandboxPtr::NULL;
            }
        };
        let data = self.allocate_utf8(&s);
        if data.is_null() {
            return SandboxPtr::NULL;
        }
        let len = u32::try_from(s.len()).unwrap_or(u32::MAX);
        let slot = self.new_ref(Tag::StringRef, data, len);
        if slot.is_null() {
            self.free(data);
        }
        slot
    }

    fn create_date_value(&mut self, millis: f64) -> SandboxPtr {
        self.new_slot(Tag::Date, &millis.to_le_bytes())
    }

    fn create_stream_value(&mut self, handle: u32) -> SandboxPtr {
        self.new_slot(Tag::StreamHandle, &handle.to_le_bytes())
    }

    fn create_blob_value(&mut self, buffer: SandboxPtr, len: u32) -> SandboxPtr {
        self.new_ref(Tag::BlobRef, buffer, len)
    }

    fn create_array_value(&mut self, len: u32, type_index: u32) -> SandboxPtr {
        let Some(size) = composite_size(len).and_then(|s| s.checked_add(ARRAY_REF_COMPOSITE_OFFSET))
        else {
            return SandboxPtr::NULL;
        };
        let header = self.alloc(size);
        if header.is_null() {
            return SandboxPtr::NULL;
        }
        let composite = header.addr() + ARRAY_REF_COMPOSITE_OFFSET;
        self.store_u32(header.addr() + REF_COUNT_OFFSET, 1);
        self.store_u32(composite, len);
        self.store_u32(composite + COMPOSITE_TYPE_OFFSET, type_index);
        let slot = self.new_slot(Tag::ArrayRef, &header.addr().to_le_bytes());
        if slot.is_null() {
            self.free(header);
        }
        slot
    }

    fn array_value_set_element_value(&mut self, array: SandboxPtr, index: u32, value: SandboxPtr) {
        if !self.is_live(array) || !self.is_live(value) {
            tracing::error!(
                array = array.addr(),
                value = value.addr(),
                "element store through an unallocated slot"
            );
            return;
        }
        if self.slot_tag(array.addr()) != Some(Tag::ArrayRef) {
            tracing::error!(array = array.addr(), "element store into a non-array slot");
            return;
        }
        let composite = self.load_u32(array.addr() + PAYLOAD_OFFSET) + ARRAY_REF_COMPOSITE_OFFSET;
        let count = self.load_u32(composite);
        let Some(dst) = element_addr(composite, index).filter(|_| index < count) else {
            tracing::error!(index, count, "element store out of bounds");
            return;
        };
        self.release_contents(dst);
        let src = value.addr() as usize;
        self.memory
            .copy_within(src..src + SLOT_SIZE as usize, dst as usize);
        self.retain_contents(dst);
    }

    fn value_free(&mut self, value: SandboxPtr) {
        if value.is_null() {
            return;
        }
        if !self.is_live(value) {
            tracing::error!(addr = value.addr(), "free of an unallocated value slot");
            return;
        }
        self.release_contents(value.addr());
        self.free(value);
    }
}
