// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Byte layout of value slots, composites and reference headers.
//!
//! All multi-byte fields are little-endian (the sandbox is a wasm32-style linear memory).
//!
//! ```text
//! value slot (16 bytes)        composite                      reference header
//! +0  tag: u8                  +0  element_count: u32          +0  reserved word
//! +1  (unused)                 +4  type_index: u32             +4  refcount: u32
//! +8  payload (up to 8 bytes)  +8  slot[0]                     +8  data pointer: u32
//!                              +24 slot[1] ...                 +12 length: u32 (blobs)
//! ```
//!
//! An `array-ref` header embeds its composite at `+8` instead of a data pointer.

/// Width of one value slot.
pub const SLOT_SIZE: u32 = 16;

/// Offset of the payload inside a value slot.
pub const PAYLOAD_OFFSET: u32 = 8;

/// Size of the `{element_count, type_index}` composite header.
pub const COMPOSITE_HEADER_SIZE: u32 = 8;

/// Offset of `type_index` inside a composite header.
pub const COMPOSITE_TYPE_OFFSET: u32 = 4;

/// Offset of the refcount inside a reference header.
pub const REF_COUNT_OFFSET: u32 = 4;

/// Offset of the data pointer inside a string/blob reference header.
pub const REF_DATA_OFFSET: u32 = 8;

/// Offset of the byte length inside a blob reference header.
pub const REF_LEN_OFFSET: u32 = 12;

/// Size of a string/blob reference header.
pub const REF_HEADER_SIZE: u32 = 16;

/// Offset of the embedded composite inside an array reference header.
pub const ARRAY_REF_COMPOSITE_OFFSET: u32 = 8;

/// Address of element `index` of the composite at `composite`.
#[must_use]
pub const fn element_addr(composite: u32, index: u32) -> Option<u32> {
    match index.checked_mul(SLOT_SIZE) {
        Some(rel) => match composite.checked_add(COMPOSITE_HEADER_SIZE) {
            Some(first) => first.checked_add(rel),
            None => None,
        },
        None => None,
    }
}

/// Bytes occupied by a composite with `count` elements, header included.
#[must_use]
pub const fn composite_size(count: u32) -> Option<u32> {
    match count.checked_mul(SLOT_SIZE) {
        Some(slots) => slots.checked_add(COMPOSITE_HEADER_SIZE),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_follow_header_at_slot_stride() {
        assert_eq!(element_addr(0x100, 0), Some(0x108));
        assert_eq!(element_addr(0x100, 2), Some(0x128));
        assert_eq!(composite_size(3), Some(56));
    }

    #[test]
    fn address_overflow_is_reported() {
        assert_eq!(element_addr(u32::MAX - 4, 0), None);
        assert_eq!(element_addr(0, u32::MAX), None);
        assert_eq!(composite_size(u32::MAX / 8), None);
    }
}
