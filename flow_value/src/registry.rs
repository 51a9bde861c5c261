// Copyright 2026 the Flow Value Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The type registry shared by the host and the built flow program.
//!
//! The registry is produced offline alongside the sandbox module and is trusted as-is: the
//! marshaller does not check it against the sandbox build. Types reference each other by
//! symbolic name (`integer`, `array:integer`, `struct:Probe`, ...) and form a DAG.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Failure to load a registry artifact.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The artifact is not valid registry JSON.
    #[error("malformed type registry: {0}")]
    Malformed(String),
    /// A name in the index map points past the type table.
    #[error("type `{name}` maps to index {index}, but only {len} types are defined")]
    DanglingName {
        /// The symbolic type name.
        name: String,
        /// The index it maps to.
        index: u32,
        /// Number of types in the table.
        len: usize,
    },
}

/// A reference to another type by symbolic name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    /// Symbolic name of the referenced type.
    #[serde(rename = "valueType")]
    pub value_type: String,
}

/// One field of an object type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name, used for record lookup and for decoded record keys.
    pub name: String,
    /// Symbolic name of the field's type.
    #[serde(rename = "valueType")]
    pub value_type: String,
}

impl FieldDescriptor {
    /// Creates a field descriptor.
    pub fn new(name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: value_type.into(),
        }
    }
}

/// Shape of a type descriptor, without its payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A scalar.
    Basic,
    /// A homogeneous sequence.
    Array,
    /// A record with ordered fields.
    Object,
}

/// A registry entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeDescriptor {
    /// A scalar such as `integer`, `float`, `double`, `string` or `boolean`.
    Basic {
        /// Symbolic name, which is also the scalar kind.
        #[serde(rename = "valueType")]
        value_type: String,
    },
    /// A homogeneous sequence.
    Array {
        /// Symbolic name, conventionally `array:<element>`.
        #[serde(rename = "valueType")]
        value_type: String,
        /// The element type.
        #[serde(rename = "elementType")]
        element_type: TypeRef,
    },
    /// A record. Field order decides slot order inside the composite.
    Object {
        /// Symbolic name of the object type.
        #[serde(rename = "valueType")]
        value_type: String,
        /// Ordered fields.
        fields: Vec<FieldDescriptor>,
    },
}

impl TypeDescriptor {
    /// A basic type named `value_type`.
    pub fn basic(value_type: impl Into<String>) -> Self {
        Self::Basic {
            value_type: value_type.into(),
        }
    }

    /// An array type named `array:<element>`.
    pub fn array(element: impl Into<String>) -> Self {
        let element = element.into();
        Self::Array {
            value_type: format!("array:{element}"),
            element_type: TypeRef {
                value_type: element,
            },
        }
    }

    /// An object type with ordered `fields`.
    pub fn object(value_type: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self::Object {
            value_type: value_type.into(),
            fields,
        }
    }

    /// Symbolic name of this type.
    #[must_use]
    pub fn value_type(&self) -> &str {
        match self {
            Self::Basic { value_type }
            | Self::Array { value_type, .. }
            | Self::Object { value_type, .. } => value_type,
        }
    }

    /// Shape of this type.
    #[must_use]
    pub const fn kind(&self) -> TypeKind {
        match self {
            Self::Basic { .. } => TypeKind::Basic,
            Self::Array { .. } => TypeKind::Array,
            Self::Object { .. } => TypeKind::Object,
        }
    }

    /// Returns the fields of an object type.
    #[must_use]
    pub fn fields(&self) -> Option<&[FieldDescriptor]> {
        match self {
            Self::Object { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct Artifact {
    types: Vec<TypeDescriptor>,
    #[serde(default, rename = "typeIndexes")]
    type_indexes: Option<BTreeMap<String, u32>>,
}

/// Immutable, index-addressed table of type descriptors.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    index_by_name: HashMap<String, u32>,
}

impl TypeRegistry {
    /// Builds a registry, deriving the name index from each descriptor's symbolic name.
    ///
    /// When two descriptors share a name, the first one wins.
    #[must_use]
    pub fn new(types: Vec<TypeDescriptor>) -> Self {
        let mut index_by_name = HashMap::with_capacity(types.len());
        for (index, ty) in types.iter().enumerate() {
            let index = u32::try_from(index).unwrap_or(u32::MAX);
            index_by_name
                .entry(ty.value_type().to_string())
                .or_insert(index);
        }
        Self {
            types,
            index_by_name,
        }
    }

    /// Loads the offline artifact `{"types": [...], "typeIndexes": {...}}`.
    ///
    /// `typeIndexes` is optional; without it the name index is derived as in
    /// [`TypeRegistry::new`].
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let artifact: Artifact =
            serde_json::from_str(json).map_err(|e| RegistryError::Malformed(e.to_string()))?;
        let Some(type_indexes) = artifact.type_indexes else {
            return Ok(Self::new(artifact.types));
        };
        let len = artifact.types.len();
        let mut index_by_name = HashMap::with_capacity(type_indexes.len());
        for (name, index) in type_indexes {
            if index as usize >= len {
                return Err(RegistryError::DanglingName { name, index, len });
            }
            index_by_name.insert(name, index);
        }
        Ok(Self {
            types: artifact.types,
            index_by_name,
        })
    }

    /// Returns the descriptor at `type_index`.
    #[must_use]
    pub fn resolve(&self, type_index: u32) -> Option<&TypeDescriptor> {
        self.types.get(type_index as usize)
    }

    /// Returns the index of the type called `name`.
    #[must_use]
    pub fn type_index_by_name(&self, name: &str) -> Option<u32> {
        self.index_by_name.get(name).copied()
    }

    /// Resolves a type by symbolic name.
    #[must_use]
    pub fn resolve_name(&self, name: &str) -> Option<(u32, &TypeDescriptor)> {
        let index = self.type_index_by_name(name)?;
        Some((index, self.resolve(index)?))
    }

    /// Number of types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no types are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates `(index, descriptor)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &TypeDescriptor)> {
        (0..).zip(self.types.iter())
    }
}
