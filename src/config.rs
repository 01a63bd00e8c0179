//! Config is the facade over a typed tree and its resolvers.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};
use crate::fieldpath::Path;
use crate::interpolation::{Evaluator, Render, ResolverRegistry};
use crate::merge::{self, build, merge_node, Context, Mode};
use crate::project::{self, Object};
use crate::schema::{Schema, StructType, TypeDescriptor};
use crate::typed::{walk, Flags, Node, ValidationError, WalkEntry};
use crate::value::{self, Map, Value};

/// Config owns a tree of typed nodes.
///
/// Every mutation is applied to a copy of the tree which replaces the
/// current one only when the whole operation succeeds.
#[derive(Debug, Clone)]
pub struct Config {
    root: Node,
    resolvers: ResolverRegistry,
}

impl Config {
    /// Creates a config from a struct type, with every field at its default.
    pub fn structured(st: Arc<StructType>) -> Result<Self> {
        Self::structured_with(st, &Value::Map(Map::new()))
    }

    /// Creates a config from a struct type and merges `value` over its
    /// defaults.
    pub fn structured_with(st: Arc<StructType>, value: &Value) -> Result<Self> {
        let root = build(&TypeDescriptor::Struct(st), value, &Context::new(Mode::Merge))?;
        Ok(Self::with_root(root))
    }

    /// Creates a config from a named type of a schema document.
    pub fn from_schema(schema: &Schema, name: &str) -> Result<Self> {
        Self::structured(schema.struct_type(name)?)
    }

    /// Creates an untyped config. Every node accepts any value and new keys
    /// can be added anywhere.
    pub fn from_value(value: Value) -> Result<Self> {
        let root = build(&TypeDescriptor::Any, &value, &Context::new(Mode::Merge))?;
        Ok(Self::with_root(root))
    }

    fn with_root(root: Node) -> Self {
        Config {
            root,
            resolvers: ResolverRegistry::new(),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn resolvers(&self) -> &ResolverRegistry {
        &self.resolvers
    }

    pub fn resolvers_mut(&mut self) -> &mut ResolverRegistry {
        &mut self.resolvers
    }

    /// Registers a resolver callable as `${name:args}`.
    pub fn register_resolver<F>(&mut self, name: impl Into<String>, resolver: F)
    where
        F: Fn(&[String]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.resolvers.register(name, resolver);
    }

    /// Reads the resolved value at `path`.
    pub fn get(&self, path: &str) -> Result<Value> {
        let path = Path::parse(path)?;
        Evaluator::new(&self.root, &self.resolvers).resolve(&path)
    }

    /// Like [`Config::get`], but an absent key or index yields `None`.
    pub fn select(&self, path: &str) -> Result<Option<Value>> {
        match self.get(path) {
            Ok(value) => Ok(Some(value)),
            Err(Error::Validation(ValidationError::KeyNotFound { .. } | ValidationError::IndexOutOfRange { .. })) => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Returns the node stored at `path` without resolving anything.
    pub fn node(&self, path: &str) -> Result<&Node> {
        let path = Path::parse(path)?;
        self.root.at(&path)
    }

    /// Names the type materialized at `path`: the struct name for structs
    /// and the selected alternative for unions. Interpolations are followed.
    /// Returns `None` for null.
    pub fn type_name(&self, path: &str) -> Result<Option<String>> {
        let path = Path::parse(path)?;
        let mut evaluator = Evaluator::new(&self.root, &self.resolvers);
        let node = evaluator.lookup(&path)?;
        let node = evaluator.deref(node, &path)?;
        if node.is_null() {
            return Ok(None);
        }
        Ok(Some(match node.ty().non_null() {
            TypeDescriptor::Struct(st) => st.name().to_string(),
            other => other.to_string(),
        }))
    }

    /// Reports whether the node at `path` holds the missing marker.
    pub fn is_missing(&self, path: &str) -> Result<bool> {
        let path = Path::parse(path)?;
        let node = Evaluator::new(&self.root, &self.resolvers).lookup(&path)?;
        Ok(node.is_missing() || node.payload().is_missing())
    }

    /// Assigns `value` at `path`.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let path = Path::parse(path)?;
        let value = value.into();
        self.mutate(|root| merge::assign(root, &path, &value))
    }

    /// Appends `value` to the sequence at `path`.
    pub fn append(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let path = Path::parse(path)?;
        let value = value.into();
        self.mutate(|root| merge::append(root, &path, &value))
    }

    /// Merges a raw value into the tree.
    pub fn merge_with(&mut self, value: &Value) -> Result<()> {
        self.mutate(|root| merge_node(root, value, &Context::new(Mode::Merge)))
    }

    /// Merges another config into this one. Interpolations of `other` are
    /// carried over unresolved.
    pub fn merge_config(&mut self, other: &Config) -> Result<()> {
        self.merge_with(&other.to_container(false)?)
    }

    /// Returns a new config with `incoming` merged over `base`.
    pub fn merge(base: &Config, incoming: &Value) -> Result<Config> {
        let mut merged = base.clone();
        merged.merge_with(incoming)?;
        Ok(merged)
    }

    fn mutate(&mut self, apply: impl FnOnce(&mut Node) -> Result<()>) -> Result<()> {
        let mut root = self.root.clone();
        match apply(&mut root) {
            Ok(()) => {
                self.root = root;
                Ok(())
            }
            Err(err) => {
                debug!(error = %err, "mutation rejected");
                Err(err)
            }
        }
    }

    /// Marks the whole tree read-only, or clears the root setting.
    pub fn set_readonly(&mut self, readonly: bool) {
        self.root.flags_mut().readonly = Some(readonly);
    }

    /// Turns struct mode on or off for the whole tree.
    pub fn set_struct(&mut self, struct_mode: bool) {
        self.root.flags_mut().struct_mode = Some(struct_mode);
    }

    /// Sets the read-only flag of the node at `path`; `None` inherits.
    pub fn set_readonly_at(&mut self, path: &str, readonly: Option<bool>) -> Result<()> {
        let path = Path::parse(path)?;
        merge::update_flags(&mut self.root, &path, |flags: &mut Flags| flags.readonly = readonly)
    }

    /// Renders the tree as a raw value.
    ///
    /// Unresolved output keeps expressions and `???` as written and tags
    /// union payloads, so that it merges back into the same tree.
    pub fn to_container(&self, resolve: bool) -> Result<Value> {
        if !resolve {
            return Ok(self.root.to_raw(true));
        }
        Evaluator::new(&self.root, &self.resolvers).to_value(&self.root, &Path::new(), Render::CONTAINER)
    }

    /// Walks the unresolved tree depth-first.
    pub fn walk(&self) -> Vec<WalkEntry> {
        walk(&self.root)
    }

    /// Writes the unresolved tree as YAML.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        value::to_yaml(&self.root.to_raw(true))
    }

    /// Projects the fully resolved tree into plain objects.
    pub fn to_object(&self) -> Result<Object> {
        project::project(&self.root, &self.resolvers)
    }

    /// Deserializes the projection into caller-defined types.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        project::to_typed(&self.to_object()?)
    }
}
