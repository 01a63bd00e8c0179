//! Schema module defines the declared types configuration values are checked against.
//!
//! Descriptors can be built programmatically ([`StructType::builder`]) or
//! compiled from a YAML [`Schema`] document.

mod document;
mod elements;

pub use document::*;
pub use elements::*;
