//! The scenario value expression language
//!
//! [`ExprInterpreter`] evaluates expressions such as `"address:owner"`,
//! `"u64:5|str:abc"` or `"keccak256:str:x"` into raw bytes, while
//! [`ExprReconstructor`] goes the other way for error messages.

mod interpreter;
mod reconstructor;

pub use interpreter::{
    biguint_minimal, twos_complement_minimal, ExprInterpreter, DEFAULT_VM_TYPE,
};
pub use reconstructor::{ExprHint, ExprReconstructor};
