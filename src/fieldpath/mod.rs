//! Field path module - Addresses nodes inside a configuration tree.

mod path;

pub use path::*;
