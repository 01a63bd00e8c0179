//! Merge module - folding raw values into typed trees.
//!
//! This module provides the recursive merge engine and path-addressed
//! assignment built on top of it.

mod assign;
mod engine;

#[cfg(test)]
mod merge_test;

pub use assign::*;
pub use engine::*;
