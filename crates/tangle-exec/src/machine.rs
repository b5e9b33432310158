//! The interpreter proper.

use rustc_hash::FxHashMap;
use tangle_intern::Symbol;
use tangle_ir::{BinOp, CompoundOperator, Expr, Stmt};
use tracing::debug;

use crate::ExecError;

/// A runtime scalar value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// A signed integer.
    Int(i64),
    /// A double-precision float.
    Float(f64),
}

impl Value {
    fn as_float(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    fn as_int(self) -> Result<i64, ExecError> {
        match self {
            Self::Int(v) => Ok(v),
            Self::Float(v) => Err(ExecError::TypeMismatch(format!(
                "expected an integer, got float {v}"
            ))),
        }
    }
}

/// A bound storage buffer.
#[derive(Clone, Debug)]
pub enum Buffer {
    /// Integer storage (index arrays).
    Int(Vec<i64>),
    /// Float storage (tensor values).
    Float(Vec<f64>),
}

impl Buffer {
    fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
        }
    }

    fn load(&self, at: usize) -> Value {
        match self {
            Self::Int(v) => Value::Int(v[at]),
            Self::Float(v) => Value::Float(v[at]),
        }
    }

    fn store(&mut self, at: usize, value: Value, op: CompoundOperator) -> Result<(), ExecError> {
        match self {
            Self::Float(data) => {
                let v = value.as_float();
                match op {
                    CompoundOperator::Assign => data[at] = v,
                    CompoundOperator::Add => data[at] += v,
                }
            }
            Self::Int(data) => {
                let v = value.as_int()?;
                match op {
                    CompoundOperator::Assign => data[at] = v,
                    CompoundOperator::Add => data[at] += v,
                }
            }
        }
        Ok(())
    }
}

fn apply(op: BinOp, a: Value, b: Value) -> Result<Value, ExecError> {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        return Ok(Value::Int(match op {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            BinOp::Mul => x * y,
            BinOp::Div => {
                if y == 0 {
                    return Err(ExecError::TypeMismatch("integer division by zero".into()));
                }
                x / y
            }
        }));
    }
    let (x, y) = (a.as_float(), b.as_float());
    Ok(Value::Float(match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => x / y,
    }))
}

/// Executes lowered statements over bound buffers and scalars.
#[derive(Default)]
pub struct Machine {
    buffers: FxHashMap<Symbol, Buffer>,
    globals: FxHashMap<Symbol, Value>,
}

impl Machine {
    /// Create a machine with nothing bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a float buffer.
    pub fn bind_float(&mut self, name: &str, data: Vec<f64>) {
        self.buffers.insert(Symbol::intern(name), Buffer::Float(data));
    }

    /// Bind an integer buffer.
    pub fn bind_int(&mut self, name: &str, data: Vec<i64>) {
        self.buffers.insert(Symbol::intern(name), Buffer::Int(data));
    }

    /// Bind a global scalar.
    pub fn bind_scalar(&mut self, name: &str, value: Value) {
        self.globals.insert(Symbol::intern(name), value);
    }

    /// The contents of a bound float buffer.
    pub fn float_buffer(&self, name: &str) -> Result<&[f64], ExecError> {
        match self.buffers.get(&Symbol::intern(name)) {
            Some(Buffer::Float(data)) => Ok(data),
            Some(Buffer::Int(_)) => Err(ExecError::TypeMismatch(format!(
                "buffer `{name}` holds integers"
            ))),
            None => Err(ExecError::UnboundBuffer(name.to_string())),
        }
    }

    /// The contents of a bound integer buffer.
    pub fn int_buffer(&self, name: &str) -> Result<&[i64], ExecError> {
        match self.buffers.get(&Symbol::intern(name)) {
            Some(Buffer::Int(data)) => Ok(data),
            Some(Buffer::Float(_)) => Err(ExecError::TypeMismatch(format!(
                "buffer `{name}` holds floats"
            ))),
            None => Err(ExecError::UnboundBuffer(name.to_string())),
        }
    }

    /// Execute a statement sequence.
    pub fn run(&mut self, stmts: &[Stmt]) -> Result<(), ExecError> {
        debug!(statements = stmts.len(), "executing lowered statements");
        let mut locals = FxHashMap::default();
        for stmt in stmts {
            self.exec(stmt, &mut locals)?;
        }
        Ok(())
    }

    fn exec(
        &mut self,
        stmt: &Stmt,
        locals: &mut FxHashMap<Symbol, Value>,
    ) -> Result<(), ExecError> {
        match stmt {
            Stmt::VarDecl { var, init } => {
                let value = self.eval(init, locals)?;
                locals.insert(var.name(), value);
            }
            Stmt::Assign { var, value } => {
                let value = self.eval(value, locals)?;
                locals.insert(var.name(), value);
            }
            Stmt::Store {
                buffer,
                index,
                value,
                op,
            } => {
                let at = self.checked_index(buffer.name(), index, locals)?;
                let value = self.eval(value, locals)?;
                let Some(storage) = self.buffers.get_mut(&buffer.name()) else {
                    return Err(ExecError::UnboundBuffer(buffer.name().as_str().to_string()));
                };
                storage.store(at, value, *op)?;
            }
            Stmt::ForRange { var, lo, hi, body } => {
                let lo = self.eval(lo, locals)?.as_int()?;
                let hi = self.eval(hi, locals)?.as_int()?;
                for i in lo..hi {
                    locals.insert(var.name(), Value::Int(i));
                    for stmt in body {
                        self.exec(stmt, locals)?;
                    }
                }
            }
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    self.exec(stmt, locals)?;
                }
            }
        }
        Ok(())
    }

    fn checked_index(
        &self,
        buffer: Symbol,
        index: &Expr,
        locals: &FxHashMap<Symbol, Value>,
    ) -> Result<usize, ExecError> {
        let at = self.eval(index, locals)?.as_int()?;
        let len = self
            .buffers
            .get(&buffer)
            .map(Buffer::len)
            .ok_or_else(|| ExecError::UnboundBuffer(buffer.as_str().to_string()))?;
        if at < 0 || at as usize >= len {
            return Err(ExecError::OutOfBounds {
                buffer: buffer.as_str().to_string(),
                index: at,
                len,
            });
        }
        Ok(at as usize)
    }

    fn eval(&self, expr: &Expr, locals: &FxHashMap<Symbol, Value>) -> Result<Value, ExecError> {
        match expr {
            Expr::IntLit(v) => Ok(Value::Int(*v)),
            Expr::FloatLit(v) => Ok(Value::Float(*v)),
            Expr::VarRead(var) => locals
                .get(&var.name())
                .or_else(|| self.globals.get(&var.name()))
                .copied()
                .ok_or_else(|| ExecError::UnboundVar(var.name().as_str().to_string())),
            Expr::Load { buffer, index } => {
                let at = self.checked_index(buffer.name(), index, locals)?;
                match self.buffers.get(&buffer.name()) {
                    Some(storage) => Ok(storage.load(at)),
                    None => Err(ExecError::UnboundBuffer(buffer.name().as_str().to_string())),
                }
            }
            Expr::Neg(e) => match self.eval(e, locals)? {
                Value::Int(v) => Ok(Value::Int(-v)),
                Value::Float(v) => Ok(Value::Float(-v)),
            },
            Expr::Binary(op, a, b) => {
                apply(*op, self.eval(a, locals)?, self.eval(b, locals)?)
            }
            Expr::TensorRead(read) => Err(ExecError::UnloweredRead(read.to_string())),
        }
    }
}
