// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Field accessors for host objects that are not plain records.
//!
//! An object type in the registry has a fixed, ordered field list. Host "object variables" (a
//! serial connection, an instrument session, ...) rarely look like that record, so the embedder
//! supplies one accessor per schema field, in schema order, that knows how to pull the field
//! out of its own representation.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::host::HostValue;

/// Reads one schema field out of a host value.
pub trait FieldAccessor {
    /// Returns the field's value for `object`.
    fn get(&self, object: &HostValue) -> HostValue;

    /// Accessors for the field's own fields when the field is itself an object (or an array of
    /// objects) that needs adapting.
    fn nested(&self) -> Option<&ObjectAccessor> {
        None
    }
}

impl<F> FieldAccessor for F
where
    F: Fn(&HostValue) -> HostValue,
{
    fn get(&self, object: &HostValue) -> HostValue {
        self(object)
    }
}

/// A field accessor whose value is adapted again with nested accessors.
pub struct Nested<F> {
    get: F,
    nested: ObjectAccessor,
}

impl<F> Nested<F> {
    /// Pairs a getter with the accessors for the value it returns.
    pub fn new(get: F, nested: ObjectAccessor) -> Self {
        Self { get, nested }
    }
}

impl<F> FieldAccessor for Nested<F>
where
    F: Fn(&HostValue) -> HostValue,
{
    fn get(&self, object: &HostValue) -> HostValue {
        (self.get)(object)
    }

    fn nested(&self) -> Option<&ObjectAccessor> {
        Some(&self.nested)
    }
}

impl<F> fmt::Debug for Nested<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nested")
            .field("nested", &self.nested)
            .finish_non_exhaustive()
    }
}

/// Accessors for every field of one object type, in schema order.
///
/// For an array type, only the first accessor's [`FieldAccessor::nested`] list is used; it
/// adapts each element.
#[derive(Default)]
pub struct ObjectAccessor {
    fields: Vec<Box<dyn FieldAccessor>>,
}

impl ObjectAccessor {
    /// Creates an empty accessor list.
    #[must_use]
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Appends the accessor for the next schema field.
    #[must_use]
    pub fn field(mut self, accessor: impl FieldAccessor + 'static) -> Self {
        self.fields.push(Box::new(accessor));
        self
    }

    /// Appends an accessor whose value is adapted with `nested`.
    #[must_use]
    pub fn nested_field<F>(self, get: F, nested: Self) -> Self
    where
        F: Fn(&HostValue) -> HostValue + 'static,
    {
        self.field(Nested::new(get, nested))
    }

    /// Returns the accessor for schema field `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&dyn FieldAccessor> {
        self.fields.get(index).map(|f| &**f)
    }

    /// Number of field accessors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if there are no field accessors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Debug for ObjectAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectAccessor")
            .field("fields", &self.fields.len())
            .finish()
    }
}

/// Looks up the accessors registered for an object type by its symbolic name.
pub trait ObjectVariableTypes {
    /// Returns the accessors for `value_type`, if it is an object variable type.
    fn accessor(&self, value_type: &str) -> Option<&ObjectAccessor>;
}

impl ObjectVariableTypes for BTreeMap<String, ObjectAccessor> {
    fn accessor(&self, value_type: &str) -> Option<&ObjectAccessor> {
        self.get(value_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Record;

    #[test]
    fn closures_and_nested_accessors() {
        let inner = ObjectAccessor::new().field(|_: &HostValue| HostValue::from(5));
        let acc = ObjectAccessor::new()
            .field(|v: &HostValue| match v {
                HostValue::Record(r) => r.get("n").cloned().unwrap_or_default(),
                _ => HostValue::Undefined,
            })
            .nested_field(|_: &HostValue| HostValue::Null, inner);

        let rec = HostValue::Record(Record::new().with("n", "x"));
        assert_eq!(acc.len(), 2);
        assert_eq!(acc.get(0).unwrap().get(&rec), HostValue::from("x"));
        assert!(acc.get(0).unwrap().nested().is_none());
        let nested = acc.get(1).unwrap().nested().unwrap();
        assert_eq!(nested.get(0).unwrap().get(&rec), HostValue::from(5));
        assert!(acc.get(2).is_none());
    }
}
