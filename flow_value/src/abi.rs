// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The allocation ABI a sandbox module exposes to the host.
//!
//! The host never lays out sandbox memory on its own. Every slot, header and buffer is created by
//! one of these primitives, and the host only writes raw bytes into buffers it obtained from
//! [`SandboxAbi::malloc`].
//!
//! Value constructors return a pointer to a freshly allocated value slot owned by the caller.
//! Ownership of that slot ends with [`SandboxAbi::value_free`]; attaching it to a composite with
//! [`SandboxAbi::array_value_set_element_value`] copies the slot and shares whatever it references.

/// A pointer into sandbox linear memory. Zero is null.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct SandboxPtr(pub u32);

impl SandboxPtr {
    /// The null pointer.
    pub const NULL: Self = Self(0);

    /// Returns `true` for the null pointer.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the address.
    #[inline]
    #[must_use]
    pub const fn addr(self) -> u32 {
        self.0
    }
}

/// Primitives a sandbox module must export.
///
/// Allocation failure is reported by returning [`SandboxPtr::NULL`].
pub trait SandboxAbi {
    /// The whole linear memory.
    fn memory(&self) -> &[u8];

    /// The whole linear memory, writable.
    fn memory_mut(&mut self) -> &mut [u8];

    /// Allocates `size` bytes.
    fn malloc(&mut self, size: u32) -> SandboxPtr;

    /// Frees a buffer returned by [`SandboxAbi::malloc`] or [`SandboxAbi::allocate_utf8`].
    fn free(&mut self, ptr: SandboxPtr);

    /// Copies `s` into a fresh NUL-terminated buffer.
    fn allocate_utf8(&mut self, s: &str) -> SandboxPtr;

    /// Creates an `undefined` slot.
    fn create_undefined_value(&mut self) -> SandboxPtr;

    /// Creates a `null` slot.
    fn create_null_value(&mut self) -> SandboxPtr;

    /// Creates a `boolean` slot.
    fn create_boolean_value(&mut self, value: bool) -> SandboxPtr;

    /// Creates an `int32` slot.
    fn create_int_value(&mut self, value: i32) -> SandboxPtr;

    /// Creates a `float64` slot.
    fn create_double_value(&mut self, value: f64) -> SandboxPtr;

    /// Creates a string slot from the NUL-terminated buffer at `utf8`.
    ///
    /// The sandbox copies the bytes; the caller still owns `utf8`.
    fn create_string_value(&mut self, utf8: SandboxPtr) -> SandboxPtr;

    /// Creates a `date` slot from milliseconds since the Unix epoch.
    fn create_date_value(&mut self, millis: f64) -> SandboxPtr;

    /// Creates a `stream-handle` slot.
    fn create_stream_value(&mut self, handle: u32) -> SandboxPtr;

    /// Creates a `blob-ref` slot that takes ownership of `buffer`.
    fn create_blob_value(&mut self, buffer: SandboxPtr, len: u32) -> SandboxPtr;

    /// Creates a composite of `len` undefined elements typed as `type_index`.
    fn create_array_value(&mut self, len: u32, type_index: u32) -> SandboxPtr;

    /// Stores a copy of the slot at `value` into element `index` of the composite slot `array`.
    fn array_value_set_element_value(&mut self, array: SandboxPtr, index: u32, value: SandboxPtr);

    /// Releases a slot returned by one of the constructors.
    fn value_free(&mut self, value: SandboxPtr);
}
