//! Alternative selection for sum-typed nodes.
//!
//! Rules are tried in order and the first that applies wins:
//!
//! 1. a mapping carrying the `_type_` discriminator names the alternative,
//!    unless the current alternative owns a field of that name;
//! 2. a bare string naming a structured alternative selects it, unless some
//!    alternative would take the string as data;
//! 3. a reference expression is stored as is;
//! 4. a mapping selects the first alternative, in declaration order, that
//!    accepts it;
//! 5. a scalar selects a primitive alternative of the same kind, then one
//!    it converts to, then `any`;
//! 6. anything else is a validation error naming the candidates.

use std::borrow::Cow;

use crate::fieldpath::Path;
use crate::schema::{SumType, TypeDescriptor, DISCRIMINATOR_KEY};
use crate::typed::{accepts, coerce_scalar, ValidationError};
use crate::value::Value;

/// Resolution is the decision taken for one incoming value.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    /// Keep the expression on the union node, to be resolved on read.
    Interpolation,
    /// Switch to this alternative with a freshly defaulted payload, or keep
    /// the current payload if it is already selected.
    Select(usize),
    /// Merge `payload` into this alternative.
    Merge { index: usize, payload: Cow<'a, Value> },
}

/// Decides which alternative `incoming` selects, given the one currently
/// selected, if any.
pub fn resolve<'a>(
    current: Option<usize>,
    sum: &SumType,
    incoming: &'a Value,
    path: &Path,
) -> Result<Resolution<'a>, ValidationError> {
    if let Some(resolution) = by_discriminator(current, sum, incoming, path)? {
        return Ok(resolution);
    }
    if let Some(index) = by_selection_string(sum, incoming) {
        return Ok(Resolution::Select(index));
    }
    if incoming.is_interpolation() {
        return Ok(Resolution::Interpolation);
    }
    by_structure(sum, incoming, path)
}

fn by_discriminator<'a>(
    current: Option<usize>,
    sum: &SumType,
    incoming: &'a Value,
    path: &Path,
) -> Result<Option<Resolution<'a>>, ValidationError> {
    let Value::Map(fields) = incoming else {
        return Ok(None);
    };
    let Some(tag) = fields.get(DISCRIMINATOR_KEY) else {
        return Ok(None);
    };

    // The selected schema owns the key: it is data, not a type switch.
    if let Some(index) = current {
        if sum.get(index).is_some_and(|a| a.declares_field(DISCRIMINATOR_KEY)) {
            return Ok(Some(Resolution::Merge {
                index,
                payload: Cow::Borrowed(incoming),
            }));
        }
    }

    match tag.as_str().and_then(|name| sum.find(name)) {
        Some(index) => {
            let mut stripped = fields.clone();
            stripped.delete(DISCRIMINATOR_KEY);
            Ok(Some(Resolution::Merge {
                index,
                payload: Cow::Owned(Value::Map(stripped)),
            }))
        }
        // Nothing selected yet and the key may be a field of some alternative.
        None if current.is_none() && sum.any_declares_field(DISCRIMINATOR_KEY) => Ok(None),
        None => Err(ValidationError::unknown_alternative(
            path,
            tag.to_display_string(),
            &sum.names(),
        )),
    }
}

fn by_selection_string(sum: &SumType, incoming: &Value) -> Option<usize> {
    let Value::String(name) = incoming else {
        return None;
    };
    if incoming.is_interpolation() || sum.accepts_plain_string(name) {
        return None;
    }
    sum.find_selectable(name)
}

/// Structural matching, used when no explicit selection is present.
pub fn by_structure<'a>(sum: &SumType, incoming: &'a Value, path: &Path) -> Result<Resolution<'a>, ValidationError> {
    let merge = |index| Resolution::Merge {
        index,
        payload: Cow::Borrowed(incoming),
    };
    let alternatives = sum.alternatives();

    let found = match incoming {
        Value::Map(_) => alternatives.iter().position(|a| {
            matches!(
                a.descriptor.non_null(),
                TypeDescriptor::Struct(_) | TypeDescriptor::Mapping(_) | TypeDescriptor::Any
            ) && accepts(&a.descriptor, incoming)
        }),
        Value::List(_) => alternatives.iter().position(|a| {
            matches!(a.descriptor.non_null(), TypeDescriptor::Sequence(_) | TypeDescriptor::Any)
                && accepts(&a.descriptor, incoming)
        }),
        scalar => alternatives
            .iter()
            .position(|a| match a.descriptor.non_null() {
                TypeDescriptor::Scalar(kind) => kind.matches_exactly(scalar),
                TypeDescriptor::Literal(set) => set.contains(scalar),
                _ => false,
            })
            .or_else(|| {
                alternatives.iter().position(|a| match a.descriptor.non_null() {
                    TypeDescriptor::Scalar(kind) => coerce_scalar(*kind, scalar, path).is_ok(),
                    _ => false,
                })
            })
            .or_else(|| {
                alternatives
                    .iter()
                    .position(|a| matches!(a.descriptor.non_null(), TypeDescriptor::Any))
            }),
    };

    found
        .map(merge)
        .ok_or_else(|| ValidationError::union_mismatch(path, incoming, &sum.names()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StructType;
    use crate::value::Map;
    use pretty_assertions::assert_eq;

    fn ambiguous() -> SumType {
        let a = StructType::builder("A")
            .qualified_name("pkg.A")
            .field("val", TypeDescriptor::INT, 0)
            .field("kind", TypeDescriptor::STRING, "A")
            .build();
        let b = StructType::builder("B")
            .qualified_name("pkg.B")
            .field("val", TypeDescriptor::INT, 0)
            .field("kind", TypeDescriptor::STRING, "B")
            .build();
        SumType::new(vec![TypeDescriptor::Struct(a), TypeDescriptor::Struct(b)])
    }

    fn map(pairs: &[(&str, Value)]) -> Value {
        Value::Map(pairs.iter().cloned().collect::<Map>())
    }

    fn root() -> Path {
        Path::parse("u").unwrap()
    }

    #[test]
    fn test_discriminator_selects_and_is_stripped() {
        let sum = ambiguous();
        let incoming = map(&[("_type_", Value::from("pkg.B")), ("val", Value::Int(3))]);
        let resolution = resolve(Some(0), &sum, &incoming, &root()).unwrap();
        assert_eq!(
            resolution,
            Resolution::Merge {
                index: 1,
                payload: Cow::Owned(map(&[("val", Value::Int(3))])),
            }
        );

        let short = map(&[("_type_", Value::from("B"))]);
        assert!(matches!(resolve(None, &sum, &short, &root()).unwrap(), Resolution::Merge { index: 1, .. }));
    }

    #[test]
    fn test_unknown_discriminator_fails() {
        let incoming = map(&[("_type_", Value::from("C"))]);
        let err = resolve(None, &ambiguous(), &incoming, &root()).unwrap_err();
        assert_eq!(err.to_string(), "u: 'C' names no alternative of Union[A, B]");
    }

    #[test]
    fn test_duck_typing_prefers_declaration_order() {
        let incoming = map(&[("val", Value::Int(1))]);
        for current in [None, Some(0), Some(1)] {
            assert!(matches!(
                resolve(current, &ambiguous(), &incoming, &root()).unwrap(),
                Resolution::Merge { index: 0, .. }
            ));
        }
    }

    #[test]
    fn test_selection_string_skipped_when_str_is_member() {
        let a = StructType::builder("A").field("x", TypeDescriptor::INT, 1).build();
        let with_str = SumType::new(vec![TypeDescriptor::STRING, TypeDescriptor::Struct(a.clone())]);
        let incoming = Value::from("A");
        assert!(matches!(
            resolve(None, &with_str, &incoming, &root()).unwrap(),
            Resolution::Merge { index: 0, .. }
        ));

        let with_int = SumType::new(vec![TypeDescriptor::INT, TypeDescriptor::Struct(a)]);
        assert_eq!(resolve(None, &with_int, &incoming, &root()).unwrap(), Resolution::Select(1));
    }

    #[test]
    fn test_scalar_fallback_order() {
        let sum = SumType::new(vec![TypeDescriptor::FLOAT, TypeDescriptor::INT, TypeDescriptor::Any]);
        let pick = |v: Value| match resolve(None, &sum, &v, &root()).unwrap() {
            Resolution::Merge { index, .. } => index,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(pick(Value::Int(3)), 1);
        assert_eq!(pick(Value::Float(3.5)), 0);
        assert_eq!(pick(Value::from("2")), 0);
        assert_eq!(pick(Value::from("hello")), 2);
    }

    #[test]
    fn test_interpolation_and_mismatch() {
        let sum = ambiguous();
        let expr = Value::from("${other}");
        assert_eq!(resolve(Some(0), &sum, &expr, &root()).unwrap(), Resolution::Interpolation);

        let err = resolve(None, &sum, &Value::from(vec![123]), &root()).unwrap_err();
        assert_eq!(err.to_string(), "u: value [123] matches no alternative of Union[A, B]");
        assert!(resolve(None, &sum, &Value::from("Invalid"), &root()).is_err());
    }
}
