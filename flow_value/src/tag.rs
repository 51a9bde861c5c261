// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value slot tags.
//!
//! The numbering is part of the wire contract shared with the sandbox runtime. Changing a byte
//! here breaks compatibility with every built flow program and must be versioned together with
//! the type registry schema.

use core::fmt;

/// One-byte discriminant stored at the start of every value slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// No value.
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean stored as a 32-bit word.
    Boolean,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    Uint8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    Uint16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    Uint32,
    /// Signed 64-bit integer (decoded through the 32-bit path).
    Int64,
    /// Unsigned 64-bit integer (decoded through the 32-bit path).
    Uint64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// NUL-terminated UTF-8 string at an absolute address.
    StringInline,
    /// NUL-terminated UTF-8 string at an offset relative to the payload word.
    StringAssetRelative,
    /// Composite at an absolute address.
    ArrayInline,
    /// Composite at an offset relative to the payload word.
    ArrayAssetRelative,
    /// String behind a reference header.
    StringRef,
    /// Composite embedded in a reference header.
    ArrayRef,
    /// Byte blob behind a reference header.
    BlobRef,
    /// Handle into the host's stream table.
    StreamHandle,
    /// Milliseconds since the Unix epoch as a 64-bit float.
    Date,
    /// Raw sandbox pointer, surfaced as a plain integer.
    Pointer,
}

impl Tag {
    /// Every tag, in wire order.
    pub const ALL: [Self; 23] = [
        Self::Undefined,
        Self::Null,
        Self::Boolean,
        Self::Int8,
        Self::Uint8,
        Self::Int16,
        Self::Uint16,
        Self::Int32,
        Self::Uint32,
        Self::Int64,
        Self::Uint64,
        Self::Float32,
        Self::Float64,
        Self::StringInline,
        Self::StringAssetRelative,
        Self::ArrayInline,
        Self::ArrayAssetRelative,
        Self::StringRef,
        Self::ArrayRef,
        Self::BlobRef,
        Self::StreamHandle,
        Self::Date,
        Self::Pointer,
    ];

    /// Decodes a tag byte, returning `None` for bytes outside the contract.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Undefined,
            1 => Self::Null,
            2 => Self::Boolean,
            3 => Self::Int8,
            4 => Self::Uint8,
            5 => Self::Int16,
            6 => Self::Uint16,
            7 => Self::Int32,
            8 => Self::Uint32,
            9 => Self::Int64,
            10 => Self::Uint64,
            11 => Self::Float32,
            12 => Self::Float64,
            13 => Self::StringInline,
            14 => Self::StringAssetRelative,
            15 => Self::ArrayInline,
            16 => Self::ArrayAssetRelative,
            17 => Self::StringRef,
            18 => Self::ArrayRef,
            19 => Self::BlobRef,
            20 => Self::StreamHandle,
            21 => Self::Date,
            22 => Self::Pointer,
            _ => return None,
        })
    }

    /// Returns the wire byte for this tag.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::Null => 1,
            Self::Boolean => 2,
            Self::Int8 => 3,
            Self::Uint8 => 4,
            Self::Int16 => 5,
            Self::Uint16 => 6,
            Self::Int32 => 7,
            Self::Uint32 => 8,
            Self::Int64 => 9,
            Self::Uint64 => 10,
            Self::Float32 => 11,
            Self::Float64 => 12,
            Self::StringInline => 13,
            Self::StringAssetRelative => 14,
            Self::ArrayInline => 15,
            Self::ArrayAssetRelative => 16,
            Self::StringRef => 17,
            Self::ArrayRef => 18,
            Self::BlobRef => 19,
            Self::StreamHandle => 20,
            Self::Date => 21,
            Self::Pointer => 22,
        }
    }

    /// Returns `true` for tags whose payload points at a reference header.
    #[must_use]
    pub const fn is_ref(self) -> bool {
        matches!(self, Self::StringRef | Self::ArrayRef | Self::BlobRef)
    }

    /// Stable lowercase name, used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::StringInline => "string-inline",
            Self::StringAssetRelative => "string-asset-relative",
            Self::ArrayInline => "array-inline",
            Self::ArrayAssetRelative => "array-asset-relative",
            Self::StringRef => "string-ref",
            Self::ArrayRef => "array-ref",
            Self::BlobRef => "blob-ref",
            Self::StreamHandle => "stream-handle",
            Self::Date => "date",
            Self::Pointer => "pointer",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Tag> for u8 {
    fn from(tag: Tag) -> Self {
        tag.as_u8()
    }
}
