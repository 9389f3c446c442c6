//! SQL statement model for Horizon.
//!
//! Parsing happens upstream; this module only holds the abstract syntax tree
//! the parser produces and the execution engine consumes.

pub mod ast;

pub use ast::*;
