//! Schema documents: named struct definitions written in YAML.
//!
//! A document lists struct types by name; field types either reference
//! another type through `namedType` or declare an inline type:
//!
//! ```yaml
//! types:
//! - name: Guest
//!   qualifiedName: app.users.Guest
//!   fields:
//!   - name: name
//!     type: {scalar: string}
//!     default: "???"
//! - name: Config
//!   fields:
//!   - name: user
//!     type:
//!       union:
//!       - namedType: Guest
//!       - scalar: int
//!     default: Guest
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

use super::elements::{ScalarKind, StructType, SumType, TypeDescriptor};
use crate::value::Value;

/// Errors raised while reading or compiling a schema document.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("failed to parse schema: {0}")]
    Parse(String),

    #[error("no type found matching: {0}")]
    UnknownType(String),

    #[error("type defined more than once: {0}")]
    DuplicateType(String),

    #[error("recursive type definition: {0}")]
    Recursive(String),

    #[error("invalid type reference: {0}")]
    InvalidTypeRef(String),
}

/// Schema is a list of named struct types.
///
/// Compiled descriptors are cached so that every reference to the same
/// named type shares one [`StructType`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeDef>,

    #[serde(skip)]
    compiled: Mutex<HashMap<String, Arc<StructType>>>,
}

impl Clone for Schema {
    fn clone(&self) -> Self {
        Schema::with_types(self.types.clone())
    }
}

/// TypeDef represents a named struct type in a schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none", rename = "qualifiedName")]
    pub qualified_name: Option<String>,

    /// Base types whose fields are inherited, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDef>,
}

/// FieldDef pairs a field name with a field type and optional default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,

    #[serde(default, rename = "type")]
    pub field_type: TypeRef,

    /// Default value; absent means the field is mandatory.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub default: Option<Value>,
}

// Distinguishes `default: null` from an absent key.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// TypeRef either refers to a named type or declares an inlined one.
///
/// Exactly one of the type-forming keys must be set; `optional` wraps the
/// result in a nullable descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeRef {
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "namedType")]
    pub named_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar: Option<ScalarKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<Box<TypeRef>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<Box<TypeRef>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub union: Option<Vec<TypeRef>>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub any: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef {
            named_type: Some(name.into()),
            ..Default::default()
        }
    }

    fn forms(&self) -> usize {
        [
            self.named_type.is_some(),
            self.scalar.is_some(),
            self.literal.is_some(),
            self.list.is_some(),
            self.map.is_some(),
            self.union.is_some(),
            self.any,
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

impl Schema {
    /// Creates a new empty schema.
    pub fn new() -> Self {
        Schema::default()
    }

    /// Creates a schema with the given type definitions.
    pub fn with_types(types: Vec<TypeDef>) -> Self {
        Schema {
            types,
            compiled: Mutex::new(HashMap::new()),
        }
    }

    /// Parses a schema document from YAML and checks type names are unique.
    pub fn from_yaml(yaml: &str) -> Result<Schema, SchemaError> {
        let schema: Schema =
            serde_yaml::from_str(yaml).map_err(|e| SchemaError::Parse(e.to_string()))?;
        let mut seen = std::collections::HashSet::new();
        for t in &schema.types {
            if !seen.insert(t.name.as_str()) {
                return Err(SchemaError::DuplicateType(t.name.clone()));
            }
        }
        Ok(schema)
    }

    /// Returns the list of type names in this schema.
    pub fn type_names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }

    /// FindNamedType returns the referenced TypeDef, if it exists.
    pub fn find_named_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Compiles the named struct type into a shared descriptor.
    pub fn struct_type(&self, name: &str) -> Result<Arc<StructType>, SchemaError> {
        self.compile_struct(name, &mut Vec::new())
    }

    /// Resolves a type reference into a descriptor.
    pub fn descriptor(&self, type_ref: &TypeRef) -> Result<TypeDescriptor, SchemaError> {
        self.compile_ref(type_ref, &mut Vec::new())
    }

    fn compile_struct(&self, name: &str, stack: &mut Vec<String>) -> Result<Arc<StructType>, SchemaError> {
        if let Some(st) = self.cached(name) {
            return Ok(st);
        }
        if stack.iter().any(|n| n == name) {
            let mut chain = stack.clone();
            chain.push(name.to_string());
            return Err(SchemaError::Recursive(chain.join(" -> ")));
        }
        let def = self
            .find_named_type(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))?;

        stack.push(name.to_string());
        let mut builder = StructType::builder(&def.name);
        if let Some(ref qualified) = def.qualified_name {
            builder = builder.qualified_name(qualified);
        }
        for base in &def.extends {
            let base = self.compile_struct(base, stack)?;
            builder = builder.extends(&base);
        }
        for field in &def.fields {
            let ty = self.compile_ref(&field.field_type, stack)?;
            builder = builder.declare(&field.name, ty, field.default.clone());
        }
        stack.pop();

        let st = builder.build();
        self.compiled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), st.clone());
        Ok(st)
    }

    fn cached(&self, name: &str) -> Option<Arc<StructType>> {
        self.compiled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn compile_ref(&self, tr: &TypeRef, stack: &mut Vec<String>) -> Result<TypeDescriptor, SchemaError> {
        if tr.forms() != 1 {
            return Err(SchemaError::InvalidTypeRef(format!(
                "expected exactly one of namedType, scalar, literal, list, map, union, any; found {}",
                tr.forms()
            )));
        }

        let ty = if let Some(ref name) = tr.named_type {
            TypeDescriptor::Struct(self.compile_struct(name, stack)?)
        } else if let Some(kind) = tr.scalar {
            TypeDescriptor::Scalar(kind)
        } else if let Some(ref values) = tr.literal {
            if values.is_empty() {
                return Err(SchemaError::InvalidTypeRef("empty literal set".to_string()));
            }
            TypeDescriptor::literal(values.iter().cloned())
        } else if let Some(ref element) = tr.list {
            TypeDescriptor::sequence(self.compile_ref(element, stack)?)
        } else if let Some(ref element) = tr.map {
            TypeDescriptor::mapping(self.compile_ref(element, stack)?)
        } else if let Some(ref alternatives) = tr.union {
            if alternatives.is_empty() {
                return Err(SchemaError::InvalidTypeRef("union without alternatives".to_string()));
            }
            let compiled = alternatives
                .iter()
                .map(|a| self.compile_ref(a, stack))
                .collect::<Result<Vec<_>, _>>()?;
            TypeDescriptor::Sum(Arc::new(SumType::new(compiled)))
        } else {
            TypeDescriptor::Any
        };

        Ok(if tr.optional { TypeDescriptor::nullable(ty) } else { ty })
    }
}
