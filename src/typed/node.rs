//! The typed node tree.

use indexmap::IndexMap;

use crate::error::Error;
use crate::fieldpath::{Path, PathElement};
use crate::schema::{Alternative, TypeDescriptor, DISCRIMINATOR_KEY};
use crate::typed::ValidationError;
use crate::value::{Map, Value, MISSING};

/// Per-node flags. `None` inherits the nearest ancestor's setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// Blocks mutation of the node and its descendants.
    pub readonly: Option<bool>,
    /// Blocks adding unknown keys to free-form maps.
    pub struct_mode: Option<bool>,
}

/// What a node currently holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// A mandatory value that has not been assigned.
    Missing,
    Null,
    /// A reference expression, resolved on every read.
    Interpolation(String),
    Value(Value),
    Map(IndexMap<String, Node>),
    Seq(Vec<Node>),
    Union(Selection),
}

/// The alternative a union node currently holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub index: usize,
    pub payload: Box<Node>,
}

/// Structural kind of a node, derived from its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Value,
    Map,
    Seq,
    Union,
}

/// Node is one element of a configuration tree: a declared type, flags,
/// and content. Children are exclusively owned by their container.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    ty: TypeDescriptor,
    flags: Flags,
    content: Content,
}

impl Node {
    /// Creates a node with no value. Reading it fails until it is assigned.
    pub fn unset(ty: TypeDescriptor) -> Self {
        Node {
            ty,
            flags: Flags::default(),
            content: Content::Missing,
        }
    }

    pub(crate) fn with_content(ty: TypeDescriptor, content: Content) -> Self {
        Node {
            ty,
            flags: Flags::default(),
            content,
        }
    }

    /// Returns the declared type.
    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn flags_mut(&mut self) -> &mut Flags {
        &mut self.flags
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub(crate) fn set_content(&mut self, content: Content) {
        self.content = content;
    }

    pub(crate) fn content_mut(&mut self) -> &mut Content {
        &mut self.content
    }

    pub fn kind(&self) -> NodeKind {
        match self.ty.non_null() {
            TypeDescriptor::Sum(_) => NodeKind::Union,
            TypeDescriptor::Struct(_) | TypeDescriptor::Mapping(_) => NodeKind::Map,
            TypeDescriptor::Sequence(_) => NodeKind::Seq,
            TypeDescriptor::Any => match self.content {
                Content::Map(_) => NodeKind::Map,
                Content::Seq(_) => NodeKind::Seq,
                _ => NodeKind::Value,
            },
            _ => NodeKind::Value,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.content, Content::Missing)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.content, Content::Null)
    }

    pub fn is_interpolation(&self) -> bool {
        matches!(self.content, Content::Interpolation(_))
    }

    pub fn selection(&self) -> Option<&Selection> {
        match &self.content {
            Content::Union(selection) => Some(selection),
            _ => None,
        }
    }

    /// Returns the currently selected alternative of a union node.
    pub fn selected_alternative(&self) -> Option<&Alternative> {
        let selection = self.selection()?;
        self.ty.as_sum()?.get(selection.index)
    }

    /// Follows union selections down to the node holding actual data.
    pub fn payload(&self) -> &Node {
        match &self.content {
            Content::Union(selection) => selection.payload.payload(),
            _ => self,
        }
    }

    pub(crate) fn payload_mut(&mut self) -> &mut Node {
        match self.content {
            Content::Union(ref mut selection) => selection.payload.payload_mut(),
            _ => self,
        }
    }

    /// Returns the direct child addressed by a path element, looking
    /// through union selections.
    pub fn child(&self, element: &PathElement) -> Option<&Node> {
        match &self.payload().content {
            Content::Map(children) => children.get(&element.as_key()),
            Content::Seq(items) => element.as_index().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    pub(crate) fn child_mut(&mut self, element: &PathElement) -> Option<&mut Node> {
        match self.payload_mut().content {
            Content::Map(ref mut children) => children.get_mut(&element.as_key()),
            Content::Seq(ref mut items) => element.as_index().and_then(move |i| items.get_mut(i)),
            _ => None,
        }
    }

    /// Converts the tree back into a raw value without resolving anything.
    ///
    /// Interpolations are emitted verbatim and missing values as `???`. With
    /// `discriminators`, struct payloads of unions carry the `_type_` key
    /// unless their own schema declares a field of that name.
    pub fn to_raw(&self, discriminators: bool) -> Value {
        match &self.content {
            Content::Missing => Value::from(MISSING),
            Content::Null => Value::Null,
            Content::Interpolation(expr) => Value::String(expr.clone()),
            Content::Value(v) => v.clone(),
            Content::Map(children) => Value::Map(
                children
                    .iter()
                    .map(|(k, child)| (k.clone(), child.to_raw(discriminators)))
                    .collect(),
            ),
            Content::Seq(items) => Value::List(items.iter().map(|n| n.to_raw(discriminators)).collect()),
            Content::Union(selection) => {
                let payload = selection.payload.to_raw(discriminators);
                if discriminators {
                    self.tag_payload(payload)
                } else {
                    payload
                }
            }
        }
    }

    /// Prepends the `_type_` discriminator to a union's rendered payload
    /// when that is safe to round-trip.
    pub(crate) fn tag_payload(&self, payload: Value) -> Value {
        match (payload, self.discriminator()) {
            (Value::Map(fields), Some(tag)) => {
                let mut tagged = Map::new();
                tagged.set(DISCRIMINATOR_KEY, tag);
                for (k, v) in fields.fields {
                    tagged.set(k, v);
                }
                Value::Map(tagged)
            }
            (payload, _) => payload,
        }
    }

    /// Returns the node at `path`, following union selections but not
    /// interpolations.
    pub fn at(&self, path: &Path) -> Result<&Node, Error> {
        let mut node = self;
        let mut at = Path::new();
        for element in path {
            if let Some(err) = node.step_error(element, &at) {
                return Err(err);
            }
            at.push(element.clone());
            node = node
                .child(element)
                .ok_or_else(|| Error::from(ValidationError::key_not_found(&at)))?;
        }
        Ok(node)
    }

    /// Explains why `element` cannot be addressed below this node located
    /// at `at`, or None if it can.
    pub(crate) fn step_error(&self, element: &PathElement, at: &Path) -> Option<Error> {
        let next = at.with(element.clone());
        match self.payload().content() {
            Content::Missing => Some(Error::missing(at)),
            Content::Null => Some(ValidationError::not_a_container(at, "null").into()),
            Content::Interpolation(_) => Some(ValidationError::not_a_container(at, "interpolation").into()),
            Content::Value(v) => Some(ValidationError::not_a_container(at, v.kind_name()).into()),
            Content::Map(children) => {
                if children.contains_key(&element.as_key()) {
                    None
                } else {
                    Some(ValidationError::key_not_found(&next).into())
                }
            }
            Content::Seq(items) => match element.as_index() {
                Some(i) if i < items.len() => None,
                Some(i) => Some(ValidationError::index_out_of_range(&next, i, items.len()).into()),
                None => Some(ValidationError::key_not_found(&next).into()),
            },
            Content::Union(_) => None,
        }
    }

    /// The discriminator value that safely round-trips this union's
    /// selection, or None when the selected schema owns a `_type_` field.
    pub(crate) fn discriminator(&self) -> Option<String> {
        let alternative = self.selected_alternative()?;
        let st = alternative.descriptor.as_struct()?;
        if st.has_field(DISCRIMINATOR_KEY) {
            None
        } else {
            Some(st.qualified_name().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StructType;
    use std::sync::Arc;

    fn leaf(v: impl Into<Value>) -> Node {
        Node::with_content(TypeDescriptor::INT, Content::Value(v.into()))
    }

    #[test]
    fn test_kind_follows_declared_type() {
        assert_eq!(Node::unset(TypeDescriptor::INT).kind(), NodeKind::Value);
        assert_eq!(Node::unset(TypeDescriptor::sequence(TypeDescriptor::INT)).kind(), NodeKind::Seq);
        assert_eq!(Node::unset(TypeDescriptor::mapping(TypeDescriptor::INT)).kind(), NodeKind::Map);
        let any_map = Node::with_content(TypeDescriptor::Any, Content::Map(IndexMap::new()));
        assert_eq!(any_map.kind(), NodeKind::Map);
    }

    #[test]
    fn test_to_raw_keeps_references_and_missing() {
        let mut children = IndexMap::new();
        children.insert("a".to_string(), leaf(1));
        children.insert("b".to_string(), Node::unset(TypeDescriptor::INT));
        children.insert(
            "c".to_string(),
            Node::with_content(TypeDescriptor::INT, Content::Interpolation("${a}".into())),
        );
        let node = Node::with_content(TypeDescriptor::mapping(TypeDescriptor::INT), Content::Map(children));

        let raw = node.to_raw(true);
        let map = raw.as_map().unwrap();
        assert_eq!(map.get("a"), Some(&Value::Int(1)));
        assert_eq!(map.get("b"), Some(&Value::from("???")));
        assert_eq!(map.get("c"), Some(&Value::from("${a}")));
    }

    #[test]
    fn test_union_payload_emits_discriminator() {
        let b = StructType::builder("B").qualified_name("pkg.B").field("v", TypeDescriptor::INT, 0).build();
        let sum = TypeDescriptor::sum(vec![TypeDescriptor::INT, TypeDescriptor::Struct(b.clone())]);
        let mut fields = IndexMap::new();
        fields.insert("v".to_string(), leaf(3));
        let payload = Node::with_content(TypeDescriptor::Struct(b), Content::Map(fields));
        let node = Node::with_content(
            sum,
            Content::Union(Selection {
                index: 1,
                payload: Box::new(payload),
            }),
        );

        assert_eq!(node.selected_alternative().unwrap().name, "B");
        let raw = node.to_raw(true);
        let keys: Vec<_> = raw.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["_type_", "v"]);
        assert_eq!(raw.as_map().unwrap().get("_type_"), Some(&Value::from("pkg.B")));
        assert!(!node.to_raw(false).as_map().unwrap().has("_type_"));
        assert_eq!(node.child(&PathElement::key("v")), Some(&leaf(3)));
    }

    #[test]
    fn test_own_type_field_suppresses_discriminator() {
        let st: Arc<StructType> = StructType::builder("TypeHaver")
            .field(DISCRIMINATOR_KEY, TypeDescriptor::STRING, "original")
            .build();
        let sum = TypeDescriptor::sum(vec![TypeDescriptor::Struct(st.clone())]);
        let node = Node::with_content(
            sum,
            Content::Union(Selection {
                index: 0,
                payload: Box::new(Node::with_content(TypeDescriptor::Struct(st), Content::Map(IndexMap::new()))),
            }),
        );
        assert_eq!(node.discriminator(), None);
    }
}
