//! Value module - Raw, untyped configuration values.
//!
//! This module also carries the JSON/YAML codec helpers.

mod value;

pub use value::*;
