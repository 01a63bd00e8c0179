//! Named resolver functions callable from `${name:args}`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::value::Value;

/// A resolver takes its positional string arguments and produces a value,
/// or a message describing why it could not.
pub type ResolverFn = Arc<dyn Fn(&[String]) -> Result<Value, String> + Send + Sync>;

/// ResolverRegistry maps resolver names to functions.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, ResolverFn>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver. An existing resolver of the same name is replaced.
    pub fn register<F>(&mut self, name: impl Into<String>, resolver: F)
    where
        F: Fn(&[String]) -> Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.resolvers.contains_key(&name) {
            warn!(resolver = %name, "replacing registered resolver");
        }
        self.resolvers.insert(name, Arc::new(resolver));
    }

    pub fn get(&self, name: &str) -> Option<&ResolverFn> {
        self.resolvers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolvers.contains_key(name)
    }

    /// Returns the registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resolvers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("resolvers", &self.names())
            .finish()
    }
}
