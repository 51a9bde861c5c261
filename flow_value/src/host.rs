// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host-side value model.
//!
//! This is what the encoder consumes and the decoder produces. Numbers live in a single `f64`
//! domain, like the scripting side of the host; the wire tag decides how they are stored.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use chrono::{DateTime, Utc};

/// A shared reference to a live host object the sandbox may only see by handle.
///
/// Equality and hashing go by identity: two clones of the same `HostRef` are equal, two
/// separately constructed refs are not, even when they wrap equal data.
#[derive(Clone)]
pub struct HostRef(Rc<dyn Any>);

impl HostRef {
    /// Wraps a host object.
    pub fn new<T: Any>(object: T) -> Self {
        Self(Rc::new(object))
    }

    /// Wraps an already shared host object, keeping its identity.
    pub fn from_rc(object: Rc<dyn Any>) -> Self {
        Self(object)
    }

    /// Stable identity of the referenced object for as long as any clone is alive.
    #[must_use]
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }

    /// Borrows the object as `T` if that is its concrete type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl PartialEq for HostRef {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for HostRef {}

impl core::hash::Hash for HostRef {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostRef({:#x})", self.identity())
    }
}

/// Ordered field-name to value mapping.
///
/// Field order is insertion order; decoded records come back in schema field order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, HostValue)>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Creates an empty record with room for `capacity` fields.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Sets `name` to `value`, replacing an existing field in place.
    pub fn insert(&mut self, name: impl Into<String>, value: HostValue) {
        let name = name.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    /// Builder-style [`Record::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<HostValue>) -> Self {
        self.insert(name, value.into());
        self
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns `true` if the record has a field called `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, HostValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, HostValue)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

/// A host-native value.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum HostValue {
    /// Absent.
    #[default]
    Undefined,
    /// Explicitly empty.
    Null,
    /// Boolean.
    Bool(bool),
    /// Any number; integral values in `i32` range travel as compact integers.
    Number(f64),
    /// UTF-8 string.
    String(String),
    /// Timestamp with millisecond precision.
    Date(DateTime<Utc>),
    /// Binary blob.
    Bytes(Vec<u8>),
    /// Live stream, exchanged by handle.
    Stream(HostRef),
    /// Homogeneous sequence; needs a declared array type to be encoded.
    Array(Vec<HostValue>),
    /// Plain record; needs a declared object type to be encoded.
    Record(Record),
    /// Opaque host object, only readable through field accessors.
    Object(HostRef),
}

impl HostValue {
    /// Returns `true` for `undefined` and `null`.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Bytes(_) => "bytes",
            Self::Stream(_) => "stream",
            Self::Array(_) => "array",
            Self::Record(_) => "record",
            Self::Object(_) => "object",
        }
    }

    /// Returns the number if this is a [`HostValue::Number`].
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string if this is a [`HostValue::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for HostValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<DateTime<Utc>> for HostValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Vec<Self>> for HostValue {
    fn from(value: Vec<Self>) -> Self {
        Self::Array(value)
    }
}

impl From<Record> for HostValue {
    fn from(value: Record) -> Self {
        Self::Record(value)
    }
}

/// The value type reported alongside a decoded value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// `undefined`, also the result of any decode anomaly.
    Undefined,
    /// `null`.
    Null,
    /// `boolean`.
    Boolean,
    /// `integer`: any of the integer tags, and `pointer`.
    Integer,
    /// `float`: 32-bit float.
    Float,
    /// `double`: 64-bit float.
    Double,
    /// `string`.
    String,
    /// `blob`.
    Blob,
    /// `stream`.
    Stream,
    /// `date`.
    Date,
    /// `array:<element value type>`.
    Array(String),
    /// An object type, by its symbolic registry name.
    Named(String),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Boolean => f.write_str("boolean"),
            Self::Integer => f.write_str("integer"),
            Self::Float => f.write_str("float"),
            Self::Double => f.write_str("double"),
            Self::String => f.write_str("string"),
            Self::Blob => f.write_str("blob"),
            Self::Stream => f.write_str("stream"),
            Self::Date => f.write_str("date"),
            Self::Array(element) => write!(f, "array:{element}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// A decoded value together with the type it was decoded as.
#[derive(Clone, Debug, PartialEq)]
pub struct Tagged {
    /// The host value.
    pub value: HostValue,
    /// The value type implied by the wire tag or composite type.
    pub value_type: ValueType,
}

impl Tagged {
    /// Pairs a value with its type.
    #[must_use]
    pub const fn new(value: HostValue, value_type: ValueType) -> Self {
        Self { value, value_type }
    }

    /// The sentinel returned for anomalies and filtered composites.
    #[must_use]
    pub const fn undefined() -> Self {
        Self::new(HostValue::Undefined, ValueType::Undefined)
    }

    /// Returns `true` for the `undefined` sentinel.
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self.value_type, ValueType::Undefined)
    }
}
