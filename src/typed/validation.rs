//! Validation errors and the scalar/literal checks behind every assignment.

use thiserror::Error;

use crate::error::Error as ConfigError;
use crate::fieldpath::Path;
use crate::schema::{ScalarKind, TypeDescriptor};
use crate::typed::Node;
use crate::value::Value;

/// ValidationError represents a value that does not fit its declared type.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{path}: value {value} of type {actual} is not a valid {expected}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
        value: String,
    },

    #[error("{path}: {value} is not one of {allowed}")]
    NotInLiteralSet {
        path: String,
        value: String,
        allowed: String,
    },

    #[error("{path}: field of type {expected} is not optional, cannot assign None")]
    NotNullable { path: String, expected: String },

    #[error("{path}: key '{field}' not in '{container}'")]
    UnknownField {
        path: String,
        field: String,
        container: String,
    },

    #[error("{path}: value {value} matches no alternative of Union[{candidates}]")]
    UnionMismatch {
        path: String,
        value: String,
        candidates: String,
    },

    #[error("{path}: '{name}' names no alternative of Union[{candidates}]")]
    UnknownAlternative {
        path: String,
        name: String,
        candidates: String,
    },

    #[error("{path}: key not found")]
    KeyNotFound { path: String },

    #[error("{path}: index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { path: String, index: usize, len: usize },

    #[error("{path}: cannot address into a {actual}")]
    NotAContainer { path: String, actual: String },

    #[error("invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("{message}")]
    Projection { message: String },
}

impl ValidationError {
    /// Creates a type mismatch error.
    pub fn type_mismatch(path: &Path, expected: impl ToString, value: &Value) -> Self {
        ValidationError::TypeMismatch {
            path: path.to_string(),
            expected: expected.to_string(),
            actual: value.kind_name().to_string(),
            value: value.to_string(),
        }
    }

    pub fn not_in_literal_set(path: &Path, value: &Value, allowed: &TypeDescriptor) -> Self {
        ValidationError::NotInLiteralSet {
            path: path.to_string(),
            value: value.to_string(),
            allowed: allowed.to_string(),
        }
    }

    pub fn not_nullable(path: &Path, expected: &TypeDescriptor) -> Self {
        ValidationError::NotNullable {
            path: path.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Creates an unknown field error.
    pub fn unknown_field(path: &Path, field: impl Into<String>, container: impl Into<String>) -> Self {
        ValidationError::UnknownField {
            path: path.to_string(),
            field: field.into(),
            container: container.into(),
        }
    }

    pub fn union_mismatch(path: &Path, value: &Value, candidates: &[String]) -> Self {
        ValidationError::UnionMismatch {
            path: path.to_string(),
            value: value.to_string(),
            candidates: candidates.join(", "),
        }
    }

    pub fn unknown_alternative(path: &Path, name: impl Into<String>, candidates: &[String]) -> Self {
        ValidationError::UnknownAlternative {
            path: path.to_string(),
            name: name.into(),
            candidates: candidates.join(", "),
        }
    }

    pub fn key_not_found(path: &Path) -> Self {
        ValidationError::KeyNotFound {
            path: path.to_string(),
        }
    }

    pub fn index_out_of_range(path: &Path, index: usize, len: usize) -> Self {
        ValidationError::IndexOutOfRange {
            path: path.to_string(),
            index,
            len,
        }
    }

    pub fn not_a_container(path: &Path, actual: impl Into<String>) -> Self {
        ValidationError::NotAContainer {
            path: path.to_string(),
            actual: actual.into(),
        }
    }

    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn projection(message: impl Into<String>) -> Self {
        ValidationError::Projection {
            message: message.into(),
        }
    }
}

/// Validates a raw value against a descriptor, building a detached node.
///
/// Struct fields absent from the value are defaulted; mandatory ones become
/// missing placeholders rather than failures.
pub fn validate(descriptor: &TypeDescriptor, value: &Value) -> Result<Node, ConfigError> {
    crate::merge::build(descriptor, value, &crate::merge::Context::detached())
}

/// Returns true if the value would validate against the descriptor.
pub fn accepts(descriptor: &TypeDescriptor, value: &Value) -> bool {
    validate(descriptor, value).is_ok()
}

/// Converts a raw value to the declared primitive kind.
///
/// Only non-lossy conversions are allowed: numeric strings parse, integers
/// widen to floats, but booleans never become numbers and floats never
/// truncate to integers.
pub fn coerce_scalar(kind: ScalarKind, value: &Value, path: &Path) -> Result<Value, ValidationError> {
    let mismatch = || ValidationError::type_mismatch(path, kind.name(), value);
    match (kind, value) {
        (ScalarKind::Int, Value::Int(i)) => Ok(Value::Int(*i)),
        (ScalarKind::Int, Value::String(s)) => s.trim().parse().map(Value::Int).map_err(|_| mismatch()),

        (ScalarKind::Float, Value::Float(f)) => Ok(Value::Float(*f)),
        (ScalarKind::Float, Value::Int(i)) => {
            let widened = *i as f64;
            // Above 2^53 not every integer has an exact float.
            if widened as i128 == i128::from(*i) {
                Ok(Value::Float(widened))
            } else {
                Err(mismatch())
            }
        }
        (ScalarKind::Float, Value::String(s)) => s.trim().parse().map(Value::Float).map_err(|_| mismatch()),

        (ScalarKind::Bool, Value::Bool(b)) => Ok(Value::Bool(*b)),
        (ScalarKind::Bool, Value::Int(0)) => Ok(Value::Bool(false)),
        (ScalarKind::Bool, Value::Int(1)) => Ok(Value::Bool(true)),
        (ScalarKind::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },

        (ScalarKind::String, Value::String(s)) => Ok(Value::String(s.clone())),
        (ScalarKind::String, Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
            Ok(Value::String(value.to_display_string()))
        }

        _ => Err(mismatch()),
    }
}

/// Checks membership in a literal set. Members compare by equality, so
/// `true` and `1` are distinct.
pub fn check_literal(set: &[Value], descriptor: &TypeDescriptor, value: &Value, path: &Path) -> Result<Value, ValidationError> {
    if set.iter().any(|member| member == value) {
        Ok(value.clone())
    } else {
        Err(ValidationError::not_in_literal_set(path, value, descriptor))
    }
}
