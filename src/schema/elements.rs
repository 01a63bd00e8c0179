//! Core type descriptors.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::value::{Value, MISSING};

/// Reserved mapping key that explicitly selects a union alternative.
pub const DISCRIMINATOR_KEY: &str = "_type_";

/// Primitive kinds a scalar field can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Int,
    Float,
    Bool,
    #[serde(alias = "str")]
    String,
}

impl ScalarKind {
    /// Name used for primitive union alternatives and in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::Bool => "bool",
            ScalarKind::String => "str",
        }
    }

    /// Returns true if the raw value already has this kind, without coercion.
    pub fn matches_exactly(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ScalarKind::Int, Value::Int(_))
                | (ScalarKind::Float, Value::Float(_))
                | (ScalarKind::Bool, Value::Bool(_))
                | (ScalarKind::String, Value::String(_))
        )
    }
}

/// TypeDescriptor describes the declared type of a field.
///
/// Descriptors are immutable; composite variants share their parts by `Arc`
/// so cloning a descriptor never copies a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// Accepts any value without validation.
    Any,
    Scalar(ScalarKind),
    /// A closed set of allowed values, compared by equality.
    Literal(Arc<Vec<Value>>),
    Nullable(Arc<TypeDescriptor>),
    Sequence(Arc<TypeDescriptor>),
    /// String-keyed mapping with homogeneous values.
    Mapping(Arc<TypeDescriptor>),
    Sum(Arc<SumType>),
    Struct(Arc<StructType>),
}

impl TypeDescriptor {
    pub const INT: TypeDescriptor = TypeDescriptor::Scalar(ScalarKind::Int);
    pub const FLOAT: TypeDescriptor = TypeDescriptor::Scalar(ScalarKind::Float);
    pub const BOOL: TypeDescriptor = TypeDescriptor::Scalar(ScalarKind::Bool);
    pub const STRING: TypeDescriptor = TypeDescriptor::Scalar(ScalarKind::String);

    pub fn literal<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        TypeDescriptor::Literal(Arc::new(values.into_iter().map(Into::into).collect()))
    }

    pub fn nullable(inner: TypeDescriptor) -> Self {
        match inner {
            TypeDescriptor::Nullable(_) | TypeDescriptor::Any => inner,
            other => TypeDescriptor::Nullable(Arc::new(other)),
        }
    }

    pub fn sequence(element: TypeDescriptor) -> Self {
        TypeDescriptor::Sequence(Arc::new(element))
    }

    pub fn mapping(value: TypeDescriptor) -> Self {
        TypeDescriptor::Mapping(Arc::new(value))
    }

    pub fn sum(alternatives: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        TypeDescriptor::Sum(Arc::new(SumType::new(alternatives)))
    }

    /// Returns true if null is part of this descriptor's domain.
    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeDescriptor::Nullable(_) | TypeDescriptor::Any)
    }

    /// Strips any `Nullable` wrapper.
    pub fn non_null(&self) -> &TypeDescriptor {
        match self {
            TypeDescriptor::Nullable(inner) => inner.non_null(),
            other => other,
        }
    }

    pub fn as_struct(&self) -> Option<&Arc<StructType>> {
        match self.non_null() {
            TypeDescriptor::Struct(st) => Some(st),
            _ => None,
        }
    }

    pub fn as_sum(&self) -> Option<&Arc<SumType>> {
        match self.non_null() {
            TypeDescriptor::Sum(sum) => Some(sum),
            _ => None,
        }
    }

    /// Returns true if a bare string equal to `s` is valid data for this
    /// descriptor (as opposed to a union selection string).
    pub fn accepts_plain_string(&self, s: &str) -> bool {
        match self.non_null() {
            TypeDescriptor::Scalar(ScalarKind::String) => true,
            TypeDescriptor::Literal(set) => set.iter().any(|v| v.as_str() == Some(s)),
            _ => false,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Any => write!(f, "Any"),
            TypeDescriptor::Scalar(kind) => write!(f, "{}", kind.name()),
            TypeDescriptor::Literal(set) => {
                write!(f, "Literal[")?;
                for (i, v) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            TypeDescriptor::Nullable(inner) => write!(f, "Optional[{}]", inner),
            TypeDescriptor::Sequence(inner) => write!(f, "List[{}]", inner),
            TypeDescriptor::Mapping(inner) => write!(f, "Dict[str, {}]", inner),
            TypeDescriptor::Sum(sum) => write!(f, "Union[{}]", sum.names().join(", ")),
            TypeDescriptor::Struct(st) => write!(f, "{}", st.name),
        }
    }
}

/// StructField pairs a field name with its declared type and default.
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub field_type: TypeDescriptor,
    /// Default value, None if the field is mandatory.
    pub default: Option<Value>,
}

impl StructField {
    /// A field is mandatory when it has no usable default.
    pub fn is_mandatory(&self) -> bool {
        match &self.default {
            None => true,
            Some(v) => v.is_missing_marker(),
        }
    }
}

/// StructType describes a structured object: an ordered list of named fields.
#[derive(Debug)]
pub struct StructType {
    name: String,
    qualified_name: String,
    fields: Vec<StructField>,
    field_index: OnceCell<HashMap<String, usize>>,
}

impl PartialEq for StructType {
    fn eq(&self, other: &Self) -> bool {
        self.qualified_name == other.qualified_name && self.fields == other.fields
    }
}

impl StructType {
    /// Starts building a struct type with the given short name.
    pub fn builder(name: impl Into<String>) -> StructBuilder {
        StructBuilder {
            name: name.into(),
            qualified_name: None,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified identifier, used by the discriminator key.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn fields(&self) -> &[StructField] {
        &self.fields
    }

    /// FindField returns the declared field, if it exists.
    pub fn find_field(&self, name: &str) -> Option<&StructField> {
        let index = self.field_index.get_or_init(|| {
            self.fields
                .iter()
                .enumerate()
                .map(|(i, f)| (f.name.clone(), i))
                .collect()
        });
        index.get(name).and_then(|&i| self.fields.get(i))
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.find_field(name).is_some()
    }

    /// Returns true if `name` is this type's short or qualified name.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.qualified_name == name
    }
}

/// Builder for [`StructType`].
#[derive(Debug, Clone)]
pub struct StructBuilder {
    name: String,
    qualified_name: Option<String>,
    fields: Vec<StructField>,
}

impl StructBuilder {
    pub fn qualified_name(mut self, qualified_name: impl Into<String>) -> Self {
        self.qualified_name = Some(qualified_name.into());
        self
    }

    /// Copies the fields of a base type; later declarations override them in place.
    pub fn extends(mut self, base: &StructType) -> Self {
        for field in base.fields() {
            self.push(field.clone());
        }
        self
    }

    /// Adds a field with a default value.
    pub fn field(self, name: impl Into<String>, field_type: TypeDescriptor, default: impl Into<Value>) -> Self {
        self.declare(name, field_type, Some(default.into()))
    }

    /// Adds a field that must be assigned before it can be read.
    pub fn mandatory(self, name: impl Into<String>, field_type: TypeDescriptor) -> Self {
        self.declare(name, field_type, Some(Value::from(MISSING)))
    }

    pub fn declare(mut self, name: impl Into<String>, field_type: TypeDescriptor, default: Option<Value>) -> Self {
        self.push(StructField {
            name: name.into(),
            field_type,
            default,
        });
        self
    }

    fn push(&mut self, field: StructField) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn build(self) -> Arc<StructType> {
        let qualified_name = self.qualified_name.unwrap_or_else(|| self.name.clone());
        Arc::new(StructType {
            name: self.name,
            qualified_name,
            fields: self.fields,
            field_index: OnceCell::new(),
        })
    }
}

/// One named member of a sum type.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub name: String,
    pub descriptor: TypeDescriptor,
}

impl Alternative {
    /// Creates an alternative named after its descriptor.
    pub fn new(descriptor: TypeDescriptor) -> Self {
        let name = match descriptor.non_null() {
            TypeDescriptor::Any => "any".to_string(),
            TypeDescriptor::Struct(st) => st.name().to_string(),
            other => other.to_string(),
        };
        Alternative { name, descriptor }
    }

    pub fn qualified_name(&self) -> &str {
        match self.descriptor.non_null() {
            TypeDescriptor::Struct(st) => st.qualified_name(),
            _ => &self.name,
        }
    }

    /// Returns true if this alternative's schema declares the given field.
    pub fn declares_field(&self, field: &str) -> bool {
        self.descriptor
            .as_struct()
            .map(|st| st.has_field(field))
            .unwrap_or(false)
    }

    fn answers_to(&self, name: &str) -> bool {
        match self.descriptor.non_null() {
            TypeDescriptor::Struct(st) => st.answers_to(name),
            _ => self.name == name,
        }
    }
}

/// SumType is a closed, ordered set of alternatives.
///
/// Declaration order is significant: structural matching picks the first
/// alternative that accepts a value.
#[derive(Debug, Clone, PartialEq)]
pub struct SumType {
    alternatives: Vec<Alternative>,
}

impl SumType {
    pub fn new(alternatives: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        SumType {
            alternatives: alternatives.into_iter().map(Alternative::new).collect(),
        }
    }

    pub fn with_alternatives(alternatives: Vec<Alternative>) -> Self {
        SumType { alternatives }
    }

    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    pub fn get(&self, index: usize) -> Option<&Alternative> {
        self.alternatives.get(index)
    }

    pub fn names(&self) -> Vec<String> {
        self.alternatives.iter().map(|a| a.name.clone()).collect()
    }

    /// Finds an alternative by short or fully-qualified name.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.alternatives.iter().position(|a| a.answers_to(name))
    }

    /// Finds a structured alternative a selection string may switch to.
    pub fn find_selectable(&self, name: &str) -> Option<usize> {
        self.alternatives
            .iter()
            .position(|a| a.descriptor.as_struct().is_some() && a.answers_to(name))
    }

    /// Returns true if some alternative takes the bare string `s` as data.
    pub fn accepts_plain_string(&self, s: &str) -> bool {
        self.alternatives
            .iter()
            .any(|a| a.descriptor.accepts_plain_string(s))
    }

    /// Returns true if any alternative declares the given field.
    pub fn any_declares_field(&self, field: &str) -> bool {
        self.alternatives.iter().any(|a| a.declares_field(field))
    }
}
