//! Typed module - the node tree and the rules values must satisfy.
//!
//! This module provides the node model, validation, union resolution and
//! tree traversal.

mod node;
pub mod union;
mod validation;
mod walk;


pub use node::*;
pub use union::Resolution;
pub use validation::*;
pub use walk::*;
