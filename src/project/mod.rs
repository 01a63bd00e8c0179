//! Project module - materializing a tree as plain objects.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Error, Result};
use crate::fieldpath::Path;
use crate::interpolation::{Evaluator, ResolverRegistry};
use crate::schema::{TypeDescriptor, DISCRIMINATOR_KEY};
use crate::typed::{Content, Node, ValidationError};
use crate::value::Value;

/// Object is a fully resolved, plain rendering of a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Object>),
    Dict(IndexMap<String, Object>),
    Instance(Instance),
}

/// An instance of a structured type.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub type_name: String,
    pub qualified_name: String,
    pub fields: IndexMap<String, Object>,
    /// Set when the instance fills a union slot; serialization then emits
    /// the `_type_` tag.
    pub tagged: bool,
}

impl Object {
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Object::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// Returns the struct name of an instance.
    pub fn type_name(&self) -> Option<&str> {
        self.as_instance().map(|i| i.type_name.as_str())
    }

    /// Looks up a field of an instance or an entry of a dict.
    pub fn get(&self, key: &str) -> Option<&Object> {
        match self {
            Object::Instance(instance) => instance.fields.get(key),
            Object::Dict(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn index(&self, i: usize) -> Option<&Object> {
        match self {
            Object::List(items) => items.get(i),
            _ => None,
        }
    }
}

impl Instance {
    /// A struct declaring its own `_type_` field serializes that field instead
    /// of the tag.
    fn emits_tag(&self) -> bool {
        self.tagged && !self.fields.contains_key(DISCRIMINATOR_KEY)
    }

    /// Number of entries the serialized map holds.
    fn entry_count(&self) -> usize {
        self.fields.len() + usize::from(self.emits_tag())
    }
}

impl From<&Value> for Object {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Object::Null,
            Value::Bool(b) => Object::Bool(*b),
            Value::Int(i) => Object::Int(*i),
            Value::Float(f) => Object::Float(*f),
            Value::String(s) => Object::String(s.clone()),
            Value::List(items) => Object::List(items.iter().map(Object::from).collect()),
            Value::Map(map) => Object::Dict(map.iter().map(|(k, v)| (k.clone(), Object::from(v))).collect()),
        }
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Object::Null => serializer.serialize_unit(),
            Object::Bool(b) => serializer.serialize_bool(*b),
            Object::Int(i) => serializer.serialize_i64(*i),
            Object::Float(f) => serializer.serialize_f64(*f),
            Object::String(s) => serializer.serialize_str(s),
            Object::List(items) => serializer.collect_seq(items),
            Object::Dict(entries) => serializer.collect_map(entries),
            Object::Instance(instance) => {
                let mut map = serializer.serialize_map(Some(instance.entry_count()))?;
                if instance.emits_tag() {
                    map.serialize_entry(DISCRIMINATOR_KEY, &instance.type_name)?;
                }
                for (key, value) in &instance.fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Projects the whole tree. Any missing value or failing interpolation
/// aborts the projection.
pub fn project(root: &Node, resolvers: &ResolverRegistry) -> Result<Object> {
    let mut evaluator = Evaluator::new(root, resolvers);
    project_node(&mut evaluator, root, &Path::new(), false)
}

fn project_node(ev: &mut Evaluator<'_>, node: &Node, path: &Path, in_union: bool) -> Result<Object> {
    match node.content() {
        Content::Missing => Err(Error::missing(path)),
        Content::Null => Ok(Object::Null),
        Content::Value(v) => Ok(Object::from(v)),
        Content::Interpolation(_) => {
            ev.with_resolved(node, path, |ev, resolved| project_node(ev, resolved, path, in_union))
        }
        Content::Map(children) => {
            let mut fields = IndexMap::with_capacity(children.len());
            for (key, child) in children {
                fields.insert(key.clone(), project_node(ev, child, &path.with_key(key.clone()), false)?);
            }
            match node.ty().non_null() {
                TypeDescriptor::Struct(st) => Ok(Object::Instance(Instance {
                    type_name: st.name().to_string(),
                    qualified_name: st.qualified_name().to_string(),
                    fields,
                    tagged: in_union,
                })),
                _ => Ok(Object::Dict(fields)),
            }
        }
        Content::Seq(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| project_node(ev, item, &path.with_index(i), false))
            .collect::<Result<Vec<_>>>()
            .map(Object::List),
        Content::Union(selection) => project_node(ev, &selection.payload, path, true),
    }
}

/// Deserializes a projection into caller-defined types.
pub fn to_typed<T: DeserializeOwned>(object: &Object) -> Result<T> {
    let json = serde_json::to_value(object).map_err(|e| ValidationError::projection(e.to_string()))?;
    serde_json::from_value(json).map_err(|e| ValidationError::projection(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{build, Context};
    use crate::schema::StructType;
    use crate::value::Map;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    fn tree(value: Value) -> Node {
        let a = StructType::builder("A").field("x", TypeDescriptor::INT, 1).build();
        let b = StructType::builder("B").field("y", TypeDescriptor::INT, 2).build();
        let root = StructType::builder("Root")
            .field("val", TypeDescriptor::sum(vec![TypeDescriptor::Struct(a), TypeDescriptor::Struct(b)]), "A")
            .field("copy", TypeDescriptor::Any, "${val}")
            .field("name", TypeDescriptor::nullable(TypeDescriptor::STRING), Value::Null)
            .build();
        build(&TypeDescriptor::Struct(root), &value, &Context::detached()).unwrap()
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(tag = "_type_")]
    enum Choice {
        A { x: i64 },
        B { y: i64 },
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Root {
        val: Choice,
        name: Option<String>,
    }

    #[test]
    fn test_project_instances() {
        let root = tree(Value::Map(Map::new()));
        let object = project(&root, &ResolverRegistry::new()).unwrap();
        assert_eq!(object.type_name(), Some("Root"));
        assert_eq!(object.get("val").and_then(Object::type_name), Some("A"));
        assert_eq!(object.get("val").and_then(|v| v.get("x")), Some(&Object::Int(1)));
        assert_eq!(object.get("copy").and_then(|v| v.get("x")), Some(&Object::Int(1)));
        assert_eq!(object.get("name"), Some(&Object::Null));
    }

    #[test]
    fn test_to_typed_uses_tag() {
        let root = tree(Value::Map([("val", "B")].into_iter().collect()));
        let object = project(&root, &ResolverRegistry::new()).unwrap();
        let typed: Root = to_typed(&object).unwrap();
        assert_eq!(
            typed,
            Root {
                val: Choice::B { y: 2 },
                name: None
            }
        );

        let json = serde_json::to_value(&object).unwrap();
        assert_eq!(json["val"]["_type_"], "B");
        assert!(json.get("_type_").is_none());
    }

    #[test]
    fn test_own_discriminator_field_replaces_tag() {
        let instance = |fields: &[(&str, Object)]| Instance {
            type_name: "Haver".into(),
            qualified_name: "pkg.Haver".into(),
            fields: fields.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect(),
            tagged: true,
        };

        let own = instance(&[("_type_", Object::String("mine".into())), ("n", Object::Int(1))]);
        assert_eq!(own.entry_count(), 2);
        let json = serde_json::to_value(Object::Instance(own)).unwrap();
        assert_eq!(json, serde_json::json!({"_type_": "mine", "n": 1}));

        let plain = instance(&[("n", Object::Int(1))]);
        assert_eq!(plain.entry_count(), 2);
        let json = serde_json::to_value(Object::Instance(plain)).unwrap();
        assert_eq!(json, serde_json::json!({"_type_": "Haver", "n": 1}));

        let untagged = Instance {
            tagged: false,
            ..instance(&[("n", Object::Int(1))])
        };
        assert_eq!(untagged.entry_count(), 1);
    }

    #[test]
    fn test_projection_is_all_or_nothing() {
        let st = StructType::builder("M").mandatory("m", TypeDescriptor::INT).build();
        let root = build(&TypeDescriptor::Struct(st), &Value::Map(Map::new()), &Context::detached()).unwrap();
        let err = project(&root, &ResolverRegistry::new()).unwrap_err();
        assert_eq!(err, Error::MissingMandatoryValue { path: "m".into() });
    }
}
