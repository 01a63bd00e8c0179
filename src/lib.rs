//! # conftree
//!
//! Hierarchical, typed configuration trees.
//!
//! A tree is built from declared struct types, merged with raw YAML/JSON
//! values, read through lazily evaluated `${...}` references, and finally
//! projected back into plain objects. Sum-typed fields pick their active
//! alternative by discriminator, selection string or structure.
//!
//! ## Modules
//!
//! - [`value`] - Raw, untyped values and the JSON/YAML codec helpers
//! - [`schema`] - Type descriptors and YAML schema documents
//! - [`fieldpath`] - Paths addressing nodes inside a tree
//! - [`typed`] - The node tree, validation and union resolution
//! - [`merge`] - Merging raw values into trees and path assignment
//! - [`interpolation`] - Reference grammar, resolvers and evaluation
//! - [`project`] - Materializing trees as plain objects
//! - [`config`] - The [`Config`] facade tying everything together

pub mod config;
pub mod error;
pub mod fieldpath;
pub mod interpolation;
pub mod merge;
pub mod project;
pub mod schema;
pub mod typed;
pub mod value;

pub use config::Config;
pub use error::{Error, Result};
pub use fieldpath::{Path, PathElement};
pub use interpolation::{InterpolationError, ResolverRegistry};
pub use project::Object;
pub use schema::{Schema, StructType, SumType, TypeDescriptor};
pub use typed::{Node, NodeKind, ValidationError};
pub use value::Value;
