//! Interpolation module - lazily evaluated `${...}` references.
//!
//! Expressions are stored verbatim on nodes and evaluated on every read
//! against the current state of the tree.

mod evaluator;
mod grammar;
mod resolver;

pub use evaluator::*;
pub use grammar::{is_interpolation, parse, Reference, Segment};
pub use resolver::*;
