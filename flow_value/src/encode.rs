// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host → sandbox encoding.
//!
//! Encoding is two-phase: [`build_tree`] lays the host value out against its registry type, then
//! [`Encoder::serialize`] walks the tree bottom-up, calling the sandbox constructors. Composite
//! children are attached into their parent's slot and their own transient slot is freed right
//! away, so no intermediate node outlives the attach call.
//!
//! Encoding never fails. Unsupported values and allocation failures are logged and encoded as
//! `null`.
//!
//! Strings travel NUL-terminated, so a host string with an interior NUL arrives cut short at the
//! first NUL. That truncation is logged as a warning.

use crate::abi::{SandboxAbi, SandboxPtr};
use crate::access::{ObjectAccessor, ObjectVariableTypes};
use crate::handles::HandleTable;
use crate::host::HostValue;
use crate::registry::TypeRegistry;
use crate::tree::{Node, build_tree};

/// A value slot the host owns until it is attached, released or handed over.
#[must_use = "sandbox values must be attached, released, or handed to the sandbox"]
#[derive(Debug, PartialEq, Eq)]
pub struct OwnedValue {
    ptr: SandboxPtr,
}

impl OwnedValue {
    /// Takes ownership of a slot returned by a sandbox constructor.
    pub fn from_raw(ptr: SandboxPtr) -> Self {
        Self { ptr }
    }

    /// Address of the slot.
    #[must_use]
    pub fn ptr(&self) -> SandboxPtr {
        self.ptr
    }

    /// Copies this slot into element `index` of `parent`, then frees this transient slot.
    pub fn attach<S: SandboxAbi + ?Sized>(self, sandbox: &mut S, parent: &Self, index: u32) {
        sandbox.array_value_set_element_value(parent.ptr, index, self.ptr);
        sandbox.value_free(self.ptr);
    }

    /// Frees the slot. A null slot, left by a failed allocation, is a no-op.
    pub fn release<S: SandboxAbi + ?Sized>(self, sandbox: &mut S) {
        if !self.ptr.is_null() {
            sandbox.value_free(self.ptr);
        }
    }

    /// Gives up ownership, e.g. when the sandbox takes the slot as a call argument.
    #[must_use]
    pub fn into_raw(self) -> SandboxPtr {
        self.ptr
    }
}

/// Returns `n` as an `i32` if it is an exact integer in `i32` range.
#[must_use]
#[expect(clippy::cast_possible_truncation, reason = "range and integrality checked")]
pub fn exact_i32(n: f64) -> Option<i32> {
    if n.fract() == 0.0 && n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX) {
        Some(n as i32)
    } else {
        None
    }
}

/// Writes host values into a sandbox.
pub struct Encoder<'a, S: SandboxAbi + ?Sized> {
    sandbox: &'a mut S,
    registry: &'a TypeRegistry,
    handles: &'a mut HandleTable,
    object_types: Option<&'a dyn ObjectVariableTypes>,
}

impl<S: SandboxAbi + ?Sized> core::fmt::Debug for Encoder<'_, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Encoder")
            .field("types", &self.registry.len())
            .field("handles", &self.handles.len())
            .finish_non_exhaustive()
    }
}

impl<'a, S: SandboxAbi + ?Sized> Encoder<'a, S> {
    /// Creates an encoder over `sandbox`.
    pub fn new(
        sandbox: &'a mut S,
        registry: &'a TypeRegistry,
        handles: &'a mut HandleTable,
    ) -> Self {
        Self {
            sandbox,
            registry,
            handles,
            object_types: None,
        }
    }

    /// Consults `object_types` for field accessors when encoding typed values.
    #[must_use]
    pub fn with_object_types(mut self, object_types: &'a dyn ObjectVariableTypes) -> Self {
        self.object_types = Some(object_types);
        self
    }

    /// Phase one: lays `value` out as `type_index`. See [`build_tree`].
    #[must_use]
    pub fn build_tree(
        &self,
        type_index: u32,
        value: &HostValue,
        accessor: Option<&ObjectAccessor>,
    ) -> Node {
        build_tree(self.registry, type_index, value, accessor)
    }

    /// Encodes a value that needs no declared type.
    ///
    /// Arrays, records and objects have no layout without a type and are encoded as `null`.
    pub fn encode(&mut self, value: &HostValue) -> OwnedValue {
        self.scalar(value)
    }

    /// Encodes `value` declared as `type_index`.
    ///
    /// Scalars are encoded directly. Composite values go through [`build_tree`], using the
    /// registered object-variable accessors for the type when there are any.
    pub fn encode_typed(&mut self, value: &HostValue, type_index: u32) -> OwnedValue {
        if !matches!(
            value,
            HostValue::Array(_) | HostValue::Record(_) | HostValue::Object(_)
        ) {
            return self.scalar(value);
        }
        let accessor = self.object_types.and_then(|types| {
            let ty = self.registry.resolve(type_index)?;
            types.accessor(ty.value_type())
        });
        let node = build_tree(self.registry, type_index, value, accessor);
        self.serialize(&node)
    }

    /// Encodes `value` declared as the type called `type_name`.
    pub fn encode_as(&mut self, value: &HostValue, type_name: &str) -> OwnedValue {
        match self.registry.type_index_by_name(type_name) {
            Some(type_index) => self.encode_typed(value, type_index),
            None => {
                tracing::error!(type_name, "encoding against a type missing from the registry");
                self.encode(value)
            }
        }
    }

    /// Phase two: writes `node` into the sandbox, children first.
    pub fn serialize(&mut self, node: &Node) -> OwnedValue {
        match node {
            Node::Value(value) => self.scalar(value),
            Node::Composite {
                type_index,
                elements,
            } => self.composite(*type_index, elements),
        }
    }

    fn composite(&mut self, type_index: u32, elements: &[Node]) -> OwnedValue {
        let Ok(len) = u32::try_from(elements.len()) else {
            tracing::error!(len = elements.len(), "composite too large for the sandbox");
            return self.null();
        };
        let array = self.sandbox.create_array_value(len, type_index);
        if array.is_null() {
            tracing::error!(len, type_index, "sandbox failed to allocate a composite");
            return self.null();
        }
        let array = OwnedValue::from_raw(array);
        for (index, element) in (0..len).zip(elements) {
            let child = self.serialize(element);
            if child.ptr().is_null() {
                tracing::error!(index, type_index, "leaving composite element undefined");
                let _ = child.into_raw();
                continue;
            }
            child.attach(&mut *self.sandbox, &array, index);
        }
        array
    }

    fn scalar(&mut self, value: &HostValue) -> OwnedValue {
        let ptr = match value {
            HostValue::Undefined => self.sandbox.create_undefined_value(),
            HostValue::Null => self.sandbox.create_null_value(),
            HostValue::Bool(b) => self.sandbox.create_boolean_value(*b),
            HostValue::Number(n) => match exact_i32(*n) {
                Some(i) => self.sandbox.create_int_value(i),
                None => self.sandbox.create_double_value(*n),
            },
            HostValue::String(s) => return self.string(s),
            HostValue::Date(date) => {
                let millis = date.timestamp_millis() as f64;
                self.sandbox.create_date_value(millis)
            }
            HostValue::Bytes(bytes) => return self.blob(bytes),
            HostValue::Stream(stream) => {
                let handle = self.handles.handle_for(stream);
                self.sandbox.create_stream_value(handle.as_u32())
            }
            HostValue::Array(_) | HostValue::Record(_) | HostValue::Object(_) => {
                tracing::error!(
                    kind = value.kind_name(),
                    "unsupported value for the sandbox, encoding null"
                );
                return self.null();
            }
        };
        if ptr.is_null() {
            tracing::error!(
                kind = value.kind_name(),
                "sandbox failed to allocate a value slot, encoding null"
            );
            return self.null();
        }
        OwnedValue::from_raw(ptr)
    }

    fn string(&mut self, s: &str) -> OwnedValue {
        if let Some(nul) = s.find('\0') {
            tracing::warn!(
                len = s.len(),
                kept = nul,
                "string has an interior NUL and is truncated in the sandbox"
            );
        }
        let utf8 = self.sandbox.allocate_utf8(s);
        if utf8.is_null() {
            tracing::error!(len = s.len(), "sandbox failed to allocate a string buffer");
            return self.null();
        }
        let ptr = self.sandbox.create_string_value(utf8);
        self.sandbox.free(utf8);
        if ptr.is_null() {
            tracing::error!(len = s.len(), "sandbox failed to allocate a string value");
            return self.null();
        }
        OwnedValue::from_raw(ptr)
    }

    fn blob(&mut self, bytes: &[u8]) -> OwnedValue {
        let Ok(len) = u32::try_from(bytes.len()) else {
            tracing::error!(len = bytes.len(), "blob too large for the sandbox");
            return self.null();
        };
        let buffer = self.sandbox.malloc(len);
        if buffer.is_null() && len > 0 {
            tracing::error!(len, "sandbox failed to allocate a blob buffer");
            return self.null();
        }
        let start = buffer.addr() as usize;
        let copied = self
            .sandbox
            .memory_mut()
            .get_mut(start..start + bytes.len())
            .map(|dst| dst.copy_from_slice(bytes));
        if copied.is_none() {
            tracing::error!(
                addr = buffer.addr(),
                len,
                "blob buffer lies outside sandbox memory"
            );
            self.sandbox.free(buffer);
            return self.null();
        }
        let ptr = self.sandbox.create_blob_value(buffer, len);
        if ptr.is_null() {
            // The buffer only changes hands when the blob is created.
            self.sandbox.free(buffer);
            tracing::error!(len, "sandbox failed to allocate a blob value");
            return self.null();
        }
        OwnedValue::from_raw(ptr)
    }

    fn null(&mut self) -> OwnedValue {
        let ptr = self.sandbox.create_null_value();
        if ptr.is_null() {
            tracing::error!("sandbox failed to allocate a null value");
        }
        OwnedValue::from_raw(ptr)
    }
}
