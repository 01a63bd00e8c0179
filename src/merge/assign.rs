//! Path-addressed mutation of a tree.

use crate::error::{Error, Result};
use crate::fieldpath::{Path, PathElement};
use crate::merge::{build, merge_node, Context, Mode};
use crate::schema::TypeDescriptor;
use crate::typed::{Content, Flags, Node, ValidationError};
use crate::value::Value;

/// Walks down `path`, returning the addressed node and the context its
/// ancestors hand down. Interpolations are not followed.
fn navigate<'n>(root: &'n mut Node, path: &[PathElement], ctx: Context) -> Result<(&'n mut Node, Context)> {
    let mut node = root;
    let mut ctx = ctx;
    for element in path {
        if let Some(err) = node.step_error(element, &ctx.path) {
            return Err(err);
        }
        ctx = enter_container(node, &ctx).child(element.clone());
        node = node
            .child_mut(element)
            .ok_or_else(|| Error::from(ValidationError::key_not_found(&ctx.path)))?;
    }
    Ok((node, ctx))
}

/// Context below a container, including the flags of a selected payload.
fn enter_container(node: &Node, ctx: &Context) -> Context {
    let ctx = ctx.enter(node.flags());
    match node.selection() {
        Some(selection) => ctx.enter(selection.payload.flags()),
        None => ctx,
    }
}

/// Assigns `value` at `path`, replacing what is there.
///
/// A missing key is created when its container is a free-form map that is
/// not in struct mode.
pub fn assign(root: &mut Node, path: &Path, value: &Value) -> Result<()> {
    let Some((last, parents)) = path.as_slice().split_last() else {
        return merge_node(root, value, &Context::new(Mode::Assign));
    };

    let (parent, ctx) = navigate(root, parents, Context::new(Mode::Assign))?;
    let inner = enter_container(parent, &ctx);
    let child_ctx = inner.child(last.clone());

    if let Some(child) = parent.child_mut(last) {
        return merge_node(child, value, &child_ctx);
    }
    if let Some(err) = absent_key_error(parent, last, &ctx.path) {
        return Err(err);
    }
    if inner.readonly {
        return Err(Error::readonly(&child_ctx.path));
    }

    let container = parent.payload_mut();
    let value_type = match container.ty().non_null() {
        TypeDescriptor::Mapping(value_type) => (**value_type).clone(),
        _ => TypeDescriptor::Any,
    };
    if let Content::Map(children) = container.content_mut() {
        if inner.struct_mode {
            return Err(ValidationError::unknown_field(&ctx.path, last.as_key(), "dict").into());
        }
        let child = build(&value_type, value, &child_ctx)?;
        children.insert(last.as_key(), child);
    }
    Ok(())
}

/// Why a key absent from `parent` cannot be created, if it cannot.
fn absent_key_error(parent: &Node, element: &PathElement, at: &Path) -> Option<Error> {
    let container = parent.payload();
    match (container.ty().non_null(), container.content()) {
        (TypeDescriptor::Struct(st), Content::Map(_)) => {
            Some(ValidationError::unknown_field(at, element.as_key(), st.name()).into())
        }
        (_, Content::Map(_)) => None,
        _ => parent.step_error(element, at),
    }
}

/// Appends `value` to the sequence at `path`, resolving it against the
/// element type exactly as a merge would.
pub fn append(root: &mut Node, path: &Path, value: &Value) -> Result<()> {
    let (node, ctx) = navigate(root, path.as_slice(), Context::new(Mode::Assign))?;
    let inner = enter_container(node, &ctx);
    if inner.readonly {
        return Err(Error::readonly(&inner.path));
    }

    let target = node.payload_mut();
    let element_type = match target.ty().non_null() {
        TypeDescriptor::Sequence(element_type) => (**element_type).clone(),
        _ => TypeDescriptor::Any,
    };
    match target.content_mut() {
        Content::Seq(items) => {
            let item = build(&element_type, value, &inner.child_index(items.len()))?;
            items.push(item);
            Ok(())
        }
        Content::Missing => Err(Error::missing(&inner.path)),
        other => {
            let actual = match other {
                Content::Map(_) => "dict",
                Content::Null => "null",
                Content::Interpolation(_) => "interpolation",
                Content::Value(v) => v.kind_name(),
                _ => "node",
            };
            Err(ValidationError::not_a_container(&inner.path, actual).into())
        }
    }
}

/// Updates the flags of the node at `path`. Flags can be changed on
/// read-only nodes.
pub fn update_flags(root: &mut Node, path: &Path, update: impl FnOnce(&mut Flags)) -> Result<()> {
    let (node, _) = navigate(root, path.as_slice(), Context::new(Mode::Assign))?;
    update(node.flags_mut());
    Ok(())
}
