//! Core building blocks of the scenario harness
//!
//! This crate provides the pieces every other crate shares:
//! - Basic types (Address, Hash)
//! - The order-preserving JSON model used to read and write scenario files
//! - The byte expression interpreter and reconstructor
//! - File resolution for `file:` references

pub mod error;
pub mod expression;
pub mod ojson;
pub mod resolver;
pub mod types;

// Re-export commonly used types
pub use error::*;
pub use expression::{ExprHint, ExprInterpreter, ExprReconstructor};
pub use ojson::{OrderedJson, OrderedMap};
pub use resolver::{DefaultFileResolver, FileResolver};
pub use types::*;
