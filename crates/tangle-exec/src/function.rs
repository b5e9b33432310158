//! The bind-then-run surface over lowered statements.

use tangle_ir::Stmt;

use crate::{ExecError, Machine, Value};

/// A lowered statement sequence with its bound runtime data.
///
/// Mirrors the backend function contract: bind every extern the lowering
/// registered (index arrays, value buffers, domain lengths), then run.
pub struct Function {
    stmts: Vec<Stmt>,
    machine: Machine,
}

impl Function {
    /// Wrap a lowered statement sequence.
    #[must_use]
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self {
            stmts,
            machine: Machine::new(),
        }
    }

    /// Bind a float buffer (tensor values).
    pub fn bind_float(&mut self, name: &str, data: Vec<f64>) {
        self.machine.bind_float(name, data);
    }

    /// Bind an integer buffer (offsets or sink arrays).
    pub fn bind_int(&mut self, name: &str, data: Vec<i64>) {
        self.machine.bind_int(name, data);
    }

    /// Bind a set's cardinality under its `<set>_len` extern.
    pub fn bind_len(&mut self, set: &str, len: usize) {
        self.machine
            .bind_scalar(&format!("{set}_len"), Value::Int(len as i64));
    }

    /// Execute the statements over the bound data.
    pub fn run(&mut self) -> Result<(), ExecError> {
        self.machine.run(&self.stmts)
    }

    /// Read back a bound float buffer.
    pub fn float_buffer(&self, name: &str) -> Result<&[f64], ExecError> {
        self.machine.float_buffer(name)
    }
}
