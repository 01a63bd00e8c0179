//! Read-time evaluation of reference expressions.

use std::ops::Deref;

use thiserror::Error;
use tracing::trace;

use crate::error::{Error as ConfigError, Result};
use crate::fieldpath::{Path, PathElement};
use crate::interpolation::grammar::{self, Reference, Segment};
use crate::interpolation::ResolverRegistry;
use crate::merge::{self, Context};
use crate::schema::TypeDescriptor;
use crate::typed::{Content, Node, ValidationError};
use crate::value::{Map, Value, MISSING};

/// InterpolationError reports a reference that cannot be evaluated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InterpolationError {
    #[error("{path}: invalid interpolation '{expression}': {message}")]
    Syntax {
        path: String,
        expression: String,
        message: String,
    },

    #[error("{path}: interpolation cycle detected: {chain}")]
    Cycle { path: String, chain: String },

    #[error("{path}: interpolation key '{reference}' not found")]
    UnresolvableReference { path: String, reference: String },

    #[error("{path}: unsupported interpolation resolver '{name}'")]
    UnknownResolver { path: String, name: String },

    #[error("{path}: resolver '{name}' failed: {message}")]
    ResolverFailed {
        path: String,
        name: String,
        message: String,
    },
}

/// Checks that `expr` parses, without evaluating it.
pub fn check_syntax(expr: &str, path: &Path) -> Result<(), InterpolationError> {
    grammar::parse(expr)
        .map(|_| ())
        .map_err(|message| InterpolationError::Syntax {
            path: path.to_string(),
            expression: expr.to_string(),
            message,
        })
}

/// A node reached during evaluation: either part of the tree, or built on
/// the fly from a resolved value.
#[derive(Debug)]
pub enum NodeRef<'a> {
    Borrowed(&'a Node),
    Owned(Box<Node>),
}

impl Deref for NodeRef<'_> {
    type Target = Node;

    fn deref(&self) -> &Node {
        match self {
            NodeRef::Borrowed(node) => node,
            NodeRef::Owned(node) => node,
        }
    }
}

impl<'a> NodeRef<'a> {
    fn child(self, element: &PathElement) -> Option<NodeRef<'a>> {
        match self {
            NodeRef::Borrowed(node) => node.child(element).map(NodeRef::Borrowed),
            NodeRef::Owned(node) => node.child(element).map(|c| NodeRef::Owned(Box::new(c.clone()))),
        }
    }

    fn into_payload(self) -> NodeRef<'a> {
        match self {
            NodeRef::Borrowed(node) => NodeRef::Borrowed(node.payload()),
            NodeRef::Owned(node) if node.selection().is_some() => NodeRef::Owned(Box::new(node.payload().clone())),
            owned => owned,
        }
    }
}

/// How a subtree is rendered back into a raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Render {
    /// Tag union payloads with their `_type_` discriminator.
    pub discriminators: bool,
    /// Fail on missing values instead of emitting `???`.
    pub strict_missing: bool,
}

impl Render {
    /// Plain data; missing values render as `???`.
    pub const DATA: Render = Render {
        discriminators: false,
        strict_missing: false,
    };

    /// Round-trippable container output.
    pub const CONTAINER: Render = Render {
        discriminators: true,
        strict_missing: false,
    };

    /// Input for re-validating a resolved value against another type.
    const REBUILD: Render = Render {
        discriminators: true,
        strict_missing: true,
    };
}

/// Evaluator resolves references against one tree.
///
/// Nothing is cached: every read walks to the current target, so edits to
/// a referenced node are visible on the next read. Expressions under
/// evaluation are tracked by node identity, so a reference that reaches
/// its own expression again, under any path, is reported as a cycle.
pub struct Evaluator<'a> {
    root: &'a Node,
    resolvers: &'a ResolverRegistry,
    visiting: Vec<(*const Node, String)>,
}

impl<'a> Evaluator<'a> {
    pub fn new(root: &'a Node, resolvers: &'a ResolverRegistry) -> Self {
        Evaluator {
            root,
            resolvers,
            visiting: Vec::new(),
        }
    }

    /// Reads the fully resolved value at `path`.
    ///
    /// The addressed node itself must be present; missing values further
    /// down render as `???`.
    pub fn resolve(&mut self, path: &Path) -> Result<Value> {
        let node = self.lookup(path)?;
        let node = self.deref(node, path)?;
        if node.is_missing() {
            return Err(ConfigError::missing(path));
        }
        self.to_value(&node, path, Render::DATA)
    }

    /// Finds the node stored at `path`. Interpolations and unions met on
    /// the way are followed; the final node is returned as stored.
    pub fn lookup(&mut self, path: &Path) -> Result<NodeRef<'a>> {
        let mut current = NodeRef::Borrowed(self.root);
        let mut at = Path::new();
        for element in path {
            let container = self.deref(current, &at)?;
            if let Some(err) = container.step_error(element, &at) {
                return Err(err);
            }
            at.push(element.clone());
            current = container
                .child(element)
                .ok_or_else(|| ConfigError::from(ValidationError::key_not_found(&at)))?;
        }
        Ok(current)
    }

    /// Resolves an interpolation stored on `node` and descends into the
    /// selected payload of a union.
    pub fn deref(&mut self, node: NodeRef<'a>, path: &Path) -> Result<NodeRef<'a>> {
        let node = self.settle(node, path)?;
        Ok(node.into_payload())
    }

    /// Marks the expression stored on `node` as under evaluation.
    fn enter(&mut self, node: &Node, path: &Path) -> Result<()> {
        if let Some(start) = self.visiting.iter().position(|(n, _)| std::ptr::eq(*n, node)) {
            let mut chain: Vec<&str> = self.visiting[start..].iter().map(|(_, p)| p.as_str()).collect();
            let key = path.to_string();
            chain.push(&key);
            return Err(InterpolationError::Cycle {
                path: key.clone(),
                chain: chain.join(" -> "),
            }
            .into());
        }
        trace!(path = %path, "resolving interpolation");
        self.visiting.push((node as *const Node, path.to_string()));
        Ok(())
    }

    fn leave(&mut self) {
        self.visiting.pop();
    }

    /// Evaluates `expr` as read by a node of type `ty` located at `path`.
    fn evaluate(&mut self, expr: &str, ty: &TypeDescriptor, path: &Path) -> Result<NodeRef<'a>> {
        let segments = grammar::parse(expr).map_err(|message| InterpolationError::Syntax {
            path: path.to_string(),
            expression: expr.to_string(),
            message,
        })?;

        let resolved = match segments.as_slice() {
            [Segment::Reference(Reference::Node { up, path: target })] => {
                let (target, target_path) = self.reference(*up, target, path)?;
                if accepts_as_is(ty, target.ty()) {
                    return Ok(target);
                }
                let value = self.to_value(&target, &target_path, Render::REBUILD)?;
                rebuild(ty, &value, path)?
            }
            [Segment::Reference(Reference::Resolver { name, args })] => {
                let value = self.call(name, args, path)?;
                rebuild(ty, &value, path)?
            }
            segments => {
                let text = self.render(segments, path)?;
                rebuild(ty, &Value::String(text), path)?
            }
        };
        Ok(NodeRef::Owned(Box::new(resolved)))
    }

    /// Locates the target of a node reference and resolves it if it is an
    /// expression itself.
    fn reference(&mut self, up: usize, target: &str, reader: &Path) -> Result<(NodeRef<'a>, Path)> {
        let unresolvable = || {
            ConfigError::from(InterpolationError::UnresolvableReference {
                path: reader.to_string(),
                reference: format!("{}{}", ".".repeat(up), target),
            })
        };

        let relative = Path::parse(target).map_err(|_| unresolvable())?;
        let target_path = if up == 0 {
            relative
        } else {
            let mut base = reader.parent().ok_or_else(unresolvable)?;
            for _ in 1..up {
                base = base.parent().ok_or_else(unresolvable)?;
            }
            base.join(&relative)
        };

        let node = match self.lookup(&target_path) {
            Ok(node) => node,
            Err(ConfigError::Validation(_)) => return Err(unresolvable()),
            Err(err) => return Err(err),
        };
        let node = self.settle(node, &target_path)?;
        if node.is_missing() {
            return Err(ConfigError::missing(&target_path));
        }
        Ok((node, target_path))
    }

    /// Replaces a node holding an expression with what it resolves to.
    fn settle(&mut self, node: NodeRef<'a>, path: &Path) -> Result<NodeRef<'a>> {
        let expr = match node.content() {
            Content::Interpolation(expr) => expr.clone(),
            _ => return Ok(node),
        };
        self.enter(&node, path)?;
        let result = self.evaluate(&expr, node.ty(), path);
        self.leave();
        result
    }

    /// Resolves the expression stored on `node` as its reader would see it
    /// and passes the result to `f`. The expression stays under evaluation
    /// until `f` returns, so references back into it are cycles. Nodes
    /// without an expression are passed through.
    pub fn with_resolved<T>(
        &mut self,
        node: &Node,
        path: &Path,
        f: impl FnOnce(&mut Self, &Node) -> Result<T>,
    ) -> Result<T> {
        let expr = match node.content() {
            Content::Interpolation(expr) => expr.clone(),
            _ => return f(self, node),
        };
        self.enter(node, path)?;
        let result = match self.evaluate(&expr, node.ty(), path) {
            Ok(resolved) => f(self, &*resolved),
            Err(err) => Err(err),
        };
        self.leave();
        result
    }

    fn call(&mut self, name: &str, args: &[String], path: &Path) -> Result<Value> {
        let resolvers = self.resolvers;
        let resolver = resolvers.get(name).ok_or_else(|| InterpolationError::UnknownResolver {
            path: path.to_string(),
            name: name.to_string(),
        })?;

        let mut rendered = Vec::with_capacity(args.len());
        for arg in args {
            let segments = grammar::parse(arg).map_err(|message| InterpolationError::Syntax {
                path: path.to_string(),
                expression: arg.clone(),
                message,
            })?;
            rendered.push(self.render(&segments, path)?);
        }

        trace!(path = %path, resolver = name, args = ?rendered, "calling resolver");
        resolver(rendered.as_slice()).map_err(|message| {
            InterpolationError::ResolverFailed {
                path: path.to_string(),
                name: name.to_string(),
                message,
            }
            .into()
        })
    }

    /// Concatenates segments into a string.
    fn render(&mut self, segments: &[Segment], path: &Path) -> Result<String> {
        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Reference(Reference::Node { up, path: target }) => {
                    let (node, target_path) = self.reference(*up, target, path)?;
                    let node = node.into_payload();
                    let value = self.to_value(&node, &target_path, Render::REBUILD)?;
                    out.push_str(&value.to_display_string());
                }
                Segment::Reference(Reference::Resolver { name, args }) => {
                    let value = self.call(name, args, path)?;
                    out.push_str(&value.to_display_string());
                }
            }
        }
        Ok(out)
    }

    /// Renders a subtree as a raw value, resolving every interpolation.
    pub fn to_value(&mut self, node: &Node, path: &Path, render: Render) -> Result<Value> {
        match node.content() {
            Content::Missing if render.strict_missing => Err(ConfigError::missing(path)),
            Content::Missing => Ok(Value::from(MISSING)),
            Content::Null => Ok(Value::Null),
            Content::Value(v) => Ok(v.clone()),
            Content::Interpolation(_) => {
                self.with_resolved(node, path, |ev, resolved| ev.to_value(resolved, path, render))
            }
            Content::Map(children) => {
                let mut map = Map::new();
                for (key, child) in children {
                    let value = self.to_value(child, &path.with_key(key.clone()), render)?;
                    map.set(key.clone(), value);
                }
                Ok(Value::Map(map))
            }
            Content::Seq(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.to_value(item, &path.with_index(i), render))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Content::Union(selection) => {
                let payload = self.to_value(&selection.payload, path, render)?;
                if render.discriminators {
                    Ok(node.tag_payload(payload))
                } else {
                    Ok(payload)
                }
            }
        }
    }
}

/// A target can be handed to a reader unchanged when their types agree.
fn accepts_as_is(reader: &TypeDescriptor, target: &TypeDescriptor) -> bool {
    matches!(reader, TypeDescriptor::Any) || reader.non_null() == target.non_null()
}

/// Validates a resolved value against the reader's declared type. Strings
/// in the value are data, never further expressions.
fn rebuild(ty: &TypeDescriptor, value: &Value, path: &Path) -> Result<Node> {
    merge::build(ty, value, &Context::detached().at(path.clone()).literal())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StructType;

    fn any_tree(yaml: &str) -> Node {
        let value = crate::value::from_yaml(yaml).unwrap();
        merge::build(&TypeDescriptor::Any, &value, &Context::detached()).unwrap()
    }

    fn resolve(root: &Node, path: &str) -> Result<Value> {
        let registry = ResolverRegistry::new();
        Evaluator::new(root, &registry).resolve(&Path::parse(path).unwrap())
    }

    #[test]
    fn test_absolute_and_chained() {
        let root = any_tree("a: 1\nb: ${a}\nc: ${b}\nd: x_${c}_y\n");
        assert_eq!(resolve(&root, "b").unwrap(), Value::Int(1));
        assert_eq!(resolve(&root, "c").unwrap(), Value::Int(1));
        assert_eq!(resolve(&root, "d").unwrap(), Value::from("x_1_y"));
    }

    #[test]
    fn test_relative_references() {
        let root = any_tree("top: 5\ngroup:\n  x: 1\n  sib: ${.x}\n  up: ${..top}\n");
        assert_eq!(resolve(&root, "group.sib").unwrap(), Value::Int(1));
        assert_eq!(resolve(&root, "group.up").unwrap(), Value::Int(5));
    }

    #[test]
    fn test_whole_reference_yields_container() {
        let root = any_tree("src:\n  k: v\ncopy: ${src}\n");
        let expected: Map = [("k", "v")].into_iter().collect();
        assert_eq!(resolve(&root, "copy").unwrap(), Value::Map(expected));
        assert_eq!(resolve(&root, "copy.k").unwrap(), Value::from("v"));
    }

    #[test]
    fn test_cycle_is_reported() {
        let root = any_tree("a: ${b}\nb: ${a}\n");
        let err = resolve(&root, "a").unwrap_err();
        assert!(matches!(err, ConfigError::Interpolation(InterpolationError::Cycle { .. })), "{err}");

        let root = any_tree("a:\n  b: ${a}\n");
        assert!(resolve(&root, "a").unwrap_err().is_interpolation());
    }

    #[test]
    fn test_unresolvable_and_missing_targets() {
        let root = any_tree("a: ${nope}\nm: ???\nr: ${m}\n");
        let err = resolve(&root, "a").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Interpolation(InterpolationError::UnresolvableReference { .. })
        ));
        let err = resolve(&root, "r").unwrap_err();
        assert_eq!(err, ConfigError::MissingMandatoryValue { path: "m".into() });
    }

    #[test]
    fn test_resolvers_and_escapes() {
        let mut registry = ResolverRegistry::new();
        registry.register("add", |args: &[String]| {
            args.iter()
                .map(|a| a.parse::<i64>().map_err(|e| e.to_string()))
                .sum::<std::result::Result<i64, String>>()
                .map(Value::Int)
        });
        let root = any_tree("n: 2\nsum: ${add:1,${n}}\nbad: ${add:x}\nnone: ${nope:1}\nlit: \\${n}\n");
        let mut ev = Evaluator::new(&root, &registry);
        assert_eq!(ev.resolve(&Path::parse("sum").unwrap()).unwrap(), Value::Int(3));
        assert!(matches!(
            ev.resolve(&Path::parse("bad").unwrap()).unwrap_err(),
            ConfigError::Interpolation(InterpolationError::ResolverFailed { .. })
        ));
        assert!(matches!(
            ev.resolve(&Path::parse("none").unwrap()).unwrap_err(),
            ConfigError::Interpolation(InterpolationError::UnknownResolver { .. })
        ));
        assert_eq!(ev.resolve(&Path::parse("lit").unwrap()).unwrap(), Value::from("${n}"));
    }

    #[test]
    fn test_resolved_value_is_revalidated() {
        let st = StructType::builder("Cfg")
            .field("port", TypeDescriptor::STRING, "8080")
            .field("as_int", TypeDescriptor::INT, "${port}")
            .field("label", TypeDescriptor::INT, "${name}")
            .field("name", TypeDescriptor::STRING, "web")
            .build();
        let root = merge::build(&TypeDescriptor::Struct(st), &Value::Map(Map::new()), &Context::detached()).unwrap();
        assert_eq!(resolve(&root, "as_int").unwrap(), Value::Int(8080));
        assert!(resolve(&root, "label").unwrap_err().is_validation());
    }
}
