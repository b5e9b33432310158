//! Interpreter errors.

use thiserror::Error;

/// An error raised while executing lowered statements.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ExecError {
    /// A buffer was read or written without being bound.
    #[error("buffer `{0}` is not bound")]
    UnboundBuffer(String),

    /// A scalar variable was read before being defined.
    #[error("variable `{0}` is not defined")]
    UnboundVar(String),

    /// A buffer access fell outside the bound storage.
    #[error("index {index} out of bounds for buffer `{buffer}` of length {len}")]
    OutOfBounds {
        /// The buffer's name.
        buffer: String,
        /// The evaluated element index.
        index: i64,
        /// The buffer's length.
        len: usize,
    },

    /// A value had the wrong type for the operation.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A symbolic tensor read survived lowering.
    #[error("unlowered tensor read `{0}` reached the interpreter")]
    UnloweredRead(String),
}
