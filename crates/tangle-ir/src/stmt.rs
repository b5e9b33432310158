//! The statement vocabulary produced by lowering.

use crate::{Expr, Var};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a store combines with the destination's current contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompoundOperator {
    /// Plain assignment: the store overwrites the destination.
    #[default]
    Assign,
    /// Accumulation: the stored value is added to the destination.
    Add,
}

impl fmt::Display for CompoundOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assign => f.write_str("="),
            Self::Add => f.write_str("+="),
        }
    }
}

/// A lowered statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// Declare and initialize a scalar variable.
    VarDecl {
        /// The variable being declared.
        var: Var,
        /// Its initial value.
        init: Expr,
    },
    /// Reassign an already-declared variable.
    Assign {
        /// The variable being assigned.
        var: Var,
        /// The new value.
        value: Expr,
    },
    /// Store into a buffer element, assigning or accumulating.
    Store {
        /// The destination buffer.
        buffer: Var,
        /// The element index.
        index: Expr,
        /// The value to store.
        value: Expr,
        /// Assign or accumulate.
        op: CompoundOperator,
    },
    /// A counted loop `for var in lo..hi { body }`.
    ForRange {
        /// The induction variable.
        var: Var,
        /// Lower bound (inclusive).
        lo: Expr,
        /// Upper bound (exclusive).
        hi: Expr,
        /// The loop body.
        body: Vec<Stmt>,
    },
    /// A statement sequence.
    Block(Vec<Stmt>),
}

impl Stmt {
    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            Self::VarDecl { var, init } => writeln!(f, "{pad}var {var} = {init};"),
            Self::Assign { var, value } => writeln!(f, "{pad}{var} = {value};"),
            Self::Store {
                buffer,
                index,
                value,
                op,
            } => writeln!(f, "{pad}{buffer}[{index}] {op} {value};"),
            Self::ForRange { var, lo, hi, body } => {
                writeln!(f, "{pad}for {var} in {lo}..{hi} {{")?;
                for stmt in body {
                    stmt.fmt_indented(f, depth + 1)?;
                }
                writeln!(f, "{pad}}}")
            }
            Self::Block(stmts) => {
                for stmt in stmts {
                    stmt.fmt_indented(f, depth)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_display_shows_operator() {
        let c = Var::int("c");
        let stmt = Stmt::Store {
            buffer: c,
            index: Expr::int(0),
            value: Expr::float(1.5),
            op: CompoundOperator::Add,
        };
        assert_eq!(stmt.to_string(), "c[0] += 1.5;\n");
    }

    #[test]
    fn for_range_display_nests() {
        let i = Var::int("i");
        let stmt = Stmt::ForRange {
            var: i.clone(),
            lo: Expr::int(0),
            hi: Expr::int(3),
            body: vec![Stmt::Assign {
                var: i,
                value: Expr::int(0),
            }],
        };
        let text = stmt.to_string();
        assert!(text.contains("for i in 0..3 {"));
        assert!(text.contains("  i = 0;"));
    }
}
