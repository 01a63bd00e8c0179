//! Recursive merge of raw values into typed nodes.

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::fieldpath::{Path, PathElement};
use crate::interpolation::{check_syntax, is_interpolation};
use crate::schema::{StructType, SumType, TypeDescriptor, DISCRIMINATOR_KEY};
use crate::typed::{check_literal, coerce_scalar, union, Content, Flags, Node, Resolution, Selection, ValidationError};
use crate::value::{Map, Value};

/// How an incoming value combines with what a node already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Containers are combined key by key; leaves are replaced.
    Merge,
    /// The node is replaced by a freshly built value.
    Assign,
}

/// Context carries the state inherited from ancestors while descending.
#[derive(Debug, Clone)]
pub struct Context {
    pub path: Path,
    pub readonly: bool,
    pub struct_mode: bool,
    pub mode: Mode,
    /// Strings are data only; `${` is not treated as an expression.
    pub literal: bool,
}

impl Context {
    pub fn new(mode: Mode) -> Self {
        Context {
            path: Path::new(),
            readonly: false,
            struct_mode: false,
            mode,
            literal: false,
        }
    }

    /// Context for validating a value outside any tree.
    pub fn detached() -> Self {
        Context::new(Mode::Merge)
    }

    pub fn at(mut self, path: Path) -> Self {
        self.path = path;
        self
    }

    pub fn literal(mut self) -> Self {
        self.literal = true;
        self
    }

    pub fn with_mode(&self, mode: Mode) -> Self {
        let mut ctx = self.clone();
        ctx.mode = mode;
        ctx
    }

    /// Applies a node's own flags on top of the inherited ones.
    pub fn enter(&self, flags: Flags) -> Self {
        let mut ctx = self.clone();
        if let Some(readonly) = flags.readonly {
            ctx.readonly = readonly;
        }
        if let Some(struct_mode) = flags.struct_mode {
            ctx.struct_mode = struct_mode;
        }
        ctx
    }

    pub fn child(&self, element: PathElement) -> Self {
        let mut ctx = self.clone();
        ctx.path.push(element);
        ctx
    }

    pub fn child_key(&self, key: &str) -> Self {
        self.child(PathElement::key(key))
    }

    pub fn child_index(&self, index: usize) -> Self {
        self.child(PathElement::index(index))
    }
}

/// Builds a node of type `ty` holding `value`.
pub fn build(ty: &TypeDescriptor, value: &Value, ctx: &Context) -> Result<Node> {
    let mut node = Node::unset(ty.clone());
    merge_node(&mut node, value, ctx)?;
    Ok(node)
}

/// Returns the content a node of type `ty` starts with: struct fields at
/// their defaults, empty containers, and missing leaves.
pub fn fresh(ty: &TypeDescriptor, ctx: &Context) -> Result<Content> {
    match ty.non_null() {
        TypeDescriptor::Struct(st) => fresh_struct(st, ctx).map(Content::Map),
        TypeDescriptor::Mapping(_) => Ok(Content::Map(IndexMap::new())),
        TypeDescriptor::Sequence(_) => Ok(Content::Seq(Vec::new())),
        _ => Ok(Content::Missing),
    }
}

fn fresh_struct(st: &StructType, ctx: &Context) -> Result<IndexMap<String, Node>> {
    let mut ctx = ctx.with_mode(Mode::Merge);
    ctx.literal = false;
    let mut children = IndexMap::with_capacity(st.fields().len());
    for field in st.fields() {
        let mut child = Node::unset(field.field_type.clone());
        if let Some(default) = &field.default {
            merge_node(&mut child, default, &ctx.child_key(&field.name))?;
        }
        children.insert(field.name.clone(), child);
    }
    Ok(children)
}

/// Merges `incoming` into `node`, validating against the node's type.
///
/// The node may be left partially updated on failure; callers that need
/// atomicity work on a copy.
pub fn merge_node(node: &mut Node, incoming: &Value, ctx: &Context) -> Result<()> {
    let ctx = ctx.enter(node.flags());
    if ctx.readonly {
        return Err(Error::readonly(&ctx.path));
    }

    if incoming.is_missing_marker() {
        if ctx.mode == Mode::Assign || node.is_missing() {
            node.set_content(Content::Missing);
        }
        return Ok(());
    }

    if incoming.is_null() {
        if !node.ty().is_nullable() {
            return Err(ValidationError::not_nullable(&ctx.path, node.ty()).into());
        }
        node.set_content(Content::Null);
        return Ok(());
    }

    let ty = node.ty().clone();
    merge_typed(node, &ty, incoming, &ctx)
}

fn merge_typed(node: &mut Node, ty: &TypeDescriptor, incoming: &Value, ctx: &Context) -> Result<()> {
    match ty {
        TypeDescriptor::Nullable(inner) => merge_typed(node, inner, incoming, ctx),
        TypeDescriptor::Sum(sum) => merge_union(node, sum, incoming, ctx),
        _ if is_expression(incoming, ctx) => store_expression(node, incoming, ctx),
        TypeDescriptor::Any => merge_any(node, incoming, ctx),
        TypeDescriptor::Scalar(kind) => {
            let value = coerce_scalar(*kind, incoming, &ctx.path)?;
            node.set_content(Content::Value(value));
            Ok(())
        }
        TypeDescriptor::Literal(set) => {
            let value = check_literal(set, ty, incoming, &ctx.path)?;
            node.set_content(Content::Value(value));
            Ok(())
        }
        TypeDescriptor::Struct(st) => merge_struct(node, st, incoming, ctx),
        TypeDescriptor::Mapping(value_type) => {
            let Value::Map(entries) = incoming else {
                return Err(ValidationError::type_mismatch(&ctx.path, ty, incoming).into());
            };
            merge_entries(node, value_type, entries, ctx, "dict")
        }
        TypeDescriptor::Sequence(element_type) => {
            let items = build_items(element_type, incoming, ctx)?;
            node.set_content(Content::Seq(items));
            Ok(())
        }
    }
}

fn is_expression(incoming: &Value, ctx: &Context) -> bool {
    !ctx.literal && matches!(incoming, Value::String(s) if is_interpolation(s))
}

fn store_expression(node: &mut Node, incoming: &Value, ctx: &Context) -> Result<()> {
    if let Value::String(expr) = incoming {
        check_syntax(expr, &ctx.path)?;
        node.set_content(Content::Interpolation(expr.clone()));
    }
    Ok(())
}

/// Untyped nodes: maps merge key by key, everything else is replaced.
fn merge_any(node: &mut Node, incoming: &Value, ctx: &Context) -> Result<()> {
    match incoming {
        Value::Map(entries) => merge_entries(node, &TypeDescriptor::Any, entries, ctx, "dict"),
        Value::List(_) => {
            let items = build_items(&TypeDescriptor::Any, incoming, ctx)?;
            node.set_content(Content::Seq(items));
            Ok(())
        }
        scalar => {
            node.set_content(Content::Value(scalar.clone()));
            Ok(())
        }
    }
}

/// Free-form maps. New keys are refused under struct mode, unless the
/// whole map is being replaced.
fn merge_entries(node: &mut Node, value_type: &TypeDescriptor, entries: &Map, ctx: &Context, container: &str) -> Result<()> {
    let replace = ctx.mode == Mode::Assign || !matches!(node.content(), Content::Map(_));
    if replace {
        let mut children = IndexMap::with_capacity(entries.len());
        for (key, value) in entries.iter() {
            children.insert(key.clone(), build(value_type, value, &ctx.child_key(key))?);
        }
        node.set_content(Content::Map(children));
        return Ok(());
    }

    if let Content::Map(children) = node.content_mut() {
        for (key, value) in entries.iter() {
            let child_ctx = ctx.child_key(key);
            match children.get_mut(key) {
                Some(child) => merge_node(child, value, &child_ctx)?,
                None if ctx.struct_mode => {
                    return Err(ValidationError::unknown_field(&ctx.path, key.as_str(), container).into());
                }
                None => {
                    let child = build(value_type, value, &child_ctx)?;
                    children.insert(key.clone(), child);
                }
            }
        }
    }
    Ok(())
}

fn merge_struct(node: &mut Node, st: &Arc<StructType>, incoming: &Value, ctx: &Context) -> Result<()> {
    let Value::Map(entries) = incoming else {
        return Err(ValidationError::type_mismatch(&ctx.path, st.name(), incoming).into());
    };

    if ctx.mode == Mode::Assign || !matches!(node.content(), Content::Map(_)) {
        node.set_content(Content::Map(fresh_struct(st, ctx)?));
    }

    if let Content::Map(children) = node.content_mut() {
        for (key, value) in entries.iter() {
            // A discriminator naming this very type carries no data.
            if key == DISCRIMINATOR_KEY
                && !st.has_field(key)
                && value.as_str().is_some_and(|name| st.answers_to(name))
            {
                continue;
            }
            let Some(child) = children.get_mut(key) else {
                return Err(ValidationError::unknown_field(&ctx.path, key.as_str(), st.name()).into());
            };
            merge_node(child, value, &ctx.child_key(key))?;
        }
    }
    Ok(())
}

fn build_items(element_type: &TypeDescriptor, incoming: &Value, ctx: &Context) -> Result<Vec<Node>> {
    let Value::List(items) = incoming else {
        return Err(ValidationError::type_mismatch(&ctx.path, TypeDescriptor::sequence(element_type.clone()), incoming).into());
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| build(element_type, item, &ctx.child_index(i)))
        .collect()
}

/// Merges into a union node. The resolver picks the alternative; this
/// applies the decision.
fn merge_union(node: &mut Node, sum: &Arc<SumType>, incoming: &Value, ctx: &Context) -> Result<()> {
    let current = node.selection().map(|s| s.index);
    let resolution = match union::resolve(current, sum, incoming, &ctx.path)? {
        Resolution::Interpolation if ctx.literal => union::by_structure(sum, incoming, &ctx.path)?,
        resolution => resolution,
    };

    match resolution {
        Resolution::Interpolation => store_expression(node, incoming, ctx),
        Resolution::Select(index) if current == Some(index) => Ok(()),
        Resolution::Select(index) => {
            let payload = fresh_payload(sum, index, ctx)?;
            switch(node, sum, index, payload, ctx);
            Ok(())
        }
        Resolution::Merge { index, payload } if current == Some(index) && ctx.mode == Mode::Merge => {
            match node.content_mut() {
                Content::Union(selection) => merge_node(&mut selection.payload, &payload, ctx),
                _ => Ok(()),
            }
        }
        Resolution::Merge { index, payload } => {
            let mut fresh = fresh_payload(sum, index, ctx)?;
            merge_node(&mut fresh, &payload, &ctx.with_mode(Mode::Merge))?;
            switch(node, sum, index, fresh, ctx);
            Ok(())
        }
    }
}

fn fresh_payload(sum: &SumType, index: usize, ctx: &Context) -> Result<Node> {
    let descriptor = sum
        .get(index)
        .map(|alternative| alternative.descriptor.clone())
        .unwrap_or(TypeDescriptor::Any);
    let content = fresh(&descriptor, ctx)?;
    Ok(Node::with_content(descriptor, content))
}

fn switch(node: &mut Node, sum: &SumType, index: usize, payload: Node, ctx: &Context) {
    if let Some(alternative) = sum.get(index) {
        debug!(path = %ctx.path, alternative = %alternative.name, "selected union alternative");
    }
    node.set_content(Content::Union(Selection {
        index,
        payload: Box::new(payload),
    }));
}
