// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounds-checked reads over sandbox linear memory.

use alloc::borrow::Cow;
use alloc::string::String;
use core::fmt;

/// A failed read from sandbox memory.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// The read extends past the end of linear memory.
    #[error("read of {len} bytes at {addr:#x} is out of bounds")]
    OutOfBounds {
        /// Start address of the read.
        addr: u32,
        /// Number of bytes requested.
        len: u32,
    },
    /// No NUL terminator before the end of linear memory.
    #[error("string at {addr:#x} is not NUL-terminated")]
    Unterminated {
        /// Start address of the string.
        addr: u32,
    },
    /// Pointer arithmetic left the 32-bit address space.
    #[error("address arithmetic overflowed")]
    AddressOverflow,
}

/// Read-only view of a sandbox's linear memory.
///
/// Multi-byte reads are little-endian and do not require alignment.
#[derive(Copy, Clone)]
pub struct HeapView<'a> {
    bytes: &'a [u8],
}

impl fmt::Debug for HeapView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapView")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

impl<'a> HeapView<'a> {
    /// Wraps a linear memory snapshot.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Returns `len` bytes starting at `addr`.
    pub fn bytes(&self, addr: u32, len: u32) -> Result<&'a [u8], MemoryError> {
        let start = addr as usize;
        let end = start
            .checked_add(len as usize)
            .ok_or(MemoryError::AddressOverflow)?;
        self.bytes
            .get(start..end)
            .ok_or(MemoryError::OutOfBounds { addr, len })
    }

    fn array<const N: usize>(&self, addr: u32) -> Result<[u8; N], MemoryError> {
        let len = u32::try_from(N).unwrap_or(u32::MAX);
        let mut out = [0_u8; N];
        out.copy_from_slice(self.bytes(addr, len)?);
        Ok(out)
    }

    /// Reads an unsigned byte.
    pub fn u8(&self, addr: u32) -> Result<u8, MemoryError> {
        Ok(self.array::<1>(addr)?[0])
    }

    /// Reads a signed byte.
    pub fn i8(&self, addr: u32) -> Result<i8, MemoryError> {
        self.array(addr).map(i8::from_le_bytes)
    }

    /// Reads an unsigned halfword.
    pub fn u16(&self, addr: u32) -> Result<u16, MemoryError> {
        self.array(addr).map(u16::from_le_bytes)
    }

    /// Reads a signed halfword.
    pub fn i16(&self, addr: u32) -> Result<i16, MemoryError> {
        self.array(addr).map(i16::from_le_bytes)
    }

    /// Reads an unsigned word.
    pub fn u32(&self, addr: u32) -> Result<u32, MemoryError> {
        self.array(addr).map(u32::from_le_bytes)
    }

    /// Reads a signed word.
    pub fn i32(&self, addr: u32) -> Result<i32, MemoryError> {
        self.array(addr).map(i32::from_le_bytes)
    }

    /// Reads a 32-bit float.
    pub fn f32(&self, addr: u32) -> Result<f32, MemoryError> {
        self.array(addr).map(f32::from_le_bytes)
    }

    /// Reads a 64-bit float.
    pub fn f64(&self, addr: u32) -> Result<f64, MemoryError> {
        self.array(addr).map(f64::from_le_bytes)
    }

    /// Reads the NUL-terminated UTF-8 string at `addr`.
    ///
    /// Invalid sequences are replaced with U+FFFD rather than rejected.
    pub fn c_str(&self, addr: u32) -> Result<String, MemoryError> {
        let tail = self
            .bytes
            .get(addr as usize..)
            .ok_or(MemoryError::OutOfBounds { addr, len: 1 })?;
        let nul = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(MemoryError::Unterminated { addr })?;
        Ok(match String::from_utf8_lossy(&tail[..nul]) {
            Cow::Borrowed(s) => String::from(s),
            Cow::Owned(s) => s,
        })
    }
}
