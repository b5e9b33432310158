//! # Tangle reference interpreter
//!
//! Executes the statement vocabulary produced by the lowering, standing in
//! for a native code generator as the downstream consumer. The
//! [`Machine`] binds named buffers and scalars and evaluates statements
//! directly over them; [`Function`] wraps a lowered statement sequence
//! with a bind-then-run surface.
//!
//! The interpreter exists to validate lowering output against reference
//! computations; it makes no attempt at performance.

#![warn(missing_docs)]

pub mod error;
pub mod function;
pub mod machine;

pub use error::ExecError;
pub use function::Function;
pub use machine::{Buffer, Machine, Value};
