// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Intermediate value trees.
//!
//! The first encoding phase walks a host value against its declared registry type and produces
//! a [`Node`] tree that mirrors the composite layout the sandbox will hold: one
//! [`Node::Composite`] per array or record, with children in slot order. Scalars are coerced to
//! their schema type on the way.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use chrono::{DateTime, Utc};

use crate::access::ObjectAccessor;
use crate::host::HostValue;
use crate::registry::{TypeDescriptor, TypeRegistry};

/// A host value laid out for serialization.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// A scalar, or a value passed through without a composite type.
    Value(HostValue),
    /// An array or record typed as `type_index`, children in slot order.
    Composite {
        /// Registry index stored in the composite header.
        type_index: u32,
        /// Child nodes.
        elements: Vec<Node>,
    },
}

impl Node {
    /// Number of nodes in the tree, this one included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        match self {
            Self::Value(_) => 1,
            Self::Composite { elements, .. } => {
                1 + elements.iter().map(Self::node_count).sum::<usize>()
            }
        }
    }
}

/// Builds the tree for `value` declared as `type_index`.
///
/// `accessor` adapts host objects that are not plain records; without it, object fields are
/// looked up by name on [`HostValue::Record`] values. An absent value for an object type stays
/// absent instead of becoming an empty record.
#[must_use]
pub fn build_tree(
    registry: &TypeRegistry,
    type_index: u32,
    value: &HostValue,
    accessor: Option<&ObjectAccessor>,
) -> Node {
    let Some(ty) = registry.resolve(type_index) else {
        tracing::error!(type_index, "unknown type index while building value tree");
        return Node::Value(value.clone());
    };
    match ty {
        TypeDescriptor::Basic { .. } => Node::Value(value.clone()),
        TypeDescriptor::Array { element_type, .. } => {
            let HostValue::Array(items) = value else {
                if !value.is_absent() {
                    tracing::warn!(
                        type_index,
                        kind = value.kind_name(),
                        "non-array value declared with an array type"
                    );
                }
                return Node::Value(value.clone());
            };
            let Some(element_index) = registry.type_index_by_name(&element_type.value_type)
            else {
                tracing::error!(
                    type_index,
                    element_type = %element_type.value_type,
                    "array element type is not in the registry"
                );
                return Node::Composite {
                    type_index,
                    elements: items.iter().cloned().map(Node::Value).collect(),
                };
            };
            let element_accessor = accessor
                .and_then(|a| a.get(0))
                .and_then(|field| field.nested());
            Node::Composite {
                type_index,
                elements: items
                    .iter()
                    .map(|item| build_tree(registry, element_index, item, element_accessor))
                    .collect(),
            }
        }
        TypeDescriptor::Object { fields, .. } => {
            if value.is_absent() {
                return Node::Value(value.clone());
            }
            let elements = fields
                .iter()
                .enumerate()
                .map(|(i, field)| {
                    let field_accessor = accessor.and_then(|a| a.get(i));
                    let field_value = match field_accessor {
                        Some(get) => get.get(value),
                        None => lookup(value, &field.name),
                    };
                    let Some((field_index, field_type)) = registry.resolve_name(&field.value_type)
                    else {
                        return Node::Value(field_value);
                    };
                    if let Some(nested) = field_accessor.and_then(|a| a.nested()) {
                        return build_tree(registry, field_index, &field_value, Some(nested));
                    }
                    match field_type {
                        TypeDescriptor::Basic { value_type } => {
                            Node::Value(coerce(field_value, value_type))
                        }
                        _ => build_tree(registry, field_index, &field_value, None),
                    }
                })
                .collect();
            Node::Composite {
                type_index,
                elements,
            }
        }
    }
}

fn lookup(value: &HostValue, name: &str) -> HostValue {
    match value {
        HostValue::Record(record) => record.get(name).cloned().unwrap_or_default(),
        _ => HostValue::Undefined,
    }
}

/// Converts a field value to the scalar kind its schema declares.
///
/// Strings bound for numeric fields are parsed leniently (longest numeric prefix, `NaN` when
/// there is none); dates bound for string fields are rendered as `YYYY-MM-DD HH:MM:SS` in UTC.
/// Everything else passes through.
#[must_use]
pub fn coerce(value: HostValue, basic_type: &str) -> HostValue {
    match (value, basic_type) {
        (HostValue::String(s), "float" | "double") => HostValue::Number(parse_float_prefix(&s)),
        (HostValue::String(s), "integer") => HostValue::Number(parse_int_prefix(&s)),
        (HostValue::Date(date), "string") => HostValue::String(format_date(&date)),
        (value, _) => value,
    }
}

/// Renders `date` as `YYYY-MM-DD HH:MM:SS`, without zone or fractional seconds.
#[must_use]
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn digit_run(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count()
}

/// Parses the longest decimal floating-point prefix of `s`, after leading whitespace.
#[must_use]
pub fn parse_float_prefix(s: &str) -> f64 {
    let t = s.trim_start();
    let bytes = t.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    if t[end..].starts_with("Infinity") {
        return if bytes.first() == Some(&b'-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let int_digits = digit_run(bytes, end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digit_run(bytes, end + 1);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = digit_run(bytes, exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }
    t[..end].parse().unwrap_or(f64::NAN)
}

/// Parses the longest integer prefix of `s`, after leading whitespace.
///
/// A `0x`/`0X` prefix selects hexadecimal. Values beyond `i64` keep growing in `f64`.
#[must_use]
pub fn parse_int_prefix(s: &str) -> f64 {
    let t = s.trim_start();
    let bytes = t.as_bytes();
    let negative = bytes.first() == Some(&b'-');
    let mut start = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut radix = 10;
    if matches!(bytes.get(start..start + 2), Some(b"0x" | b"0X")) {
        radix = 16;
        start += 2;
    }
    let mut value = 0.0_f64;
    let mut seen = false;
    for &b in &bytes[start..] {
        let Some(digit) = char::from(b).to_digit(radix) else {
            break;
        };
        value = value * f64::from(radix) + f64::from(digit);
        seen = true;
    }
    if !seen {
        return f64::NAN;
    }
    if negative { -value } else { value }
}
