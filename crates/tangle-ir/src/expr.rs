//! Scalar expressions and the tensor-algebra index expression.
//!
//! [`Expr`] is the scalar expression tree used both inside index expressions
//! (where [`TensorRead`] leaves are still symbolic) and in lowered loop
//! bodies (where reads have been replaced by [`Expr::Load`]s through
//! coordinate and sink variables).

use crate::{IndexVar, Var};
use smallvec::SmallVec;
use std::fmt;
use tangle_diagnostics::Span;

/// Binary arithmetic operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

/// How a tensor-read dimension is bound to an index variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IndexBinding {
    /// The dimension is indexed directly by an index variable.
    Var(IndexVar),
    /// The dimension is indexed by the `position`-th endpoint of the element
    /// currently denoted by `edge` (an incidence-relation access, e.g.
    /// endpoint 0 or 1 of a spring).
    Endpoint {
        /// The index variable ranging over the edge set.
        edge: IndexVar,
        /// Which endpoint of the edge, in declaration order.
        position: u32,
    },
}

impl IndexBinding {
    /// The index variable this binding mentions.
    #[must_use]
    pub fn index_var(&self) -> &IndexVar {
        match self {
            Self::Var(v) => v,
            Self::Endpoint { edge, .. } => edge,
        }
    }
}

impl fmt::Display for IndexBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(v) => write!(f, "{v}"),
            Self::Endpoint { edge, position } => write!(f, "{edge}.p{position}"),
        }
    }
}

/// A read of a tensor at bound index positions, e.g. `A(i, j)`.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorRead {
    /// The tensor being read.
    pub tensor: Var,
    /// Per-dimension bindings, outermost first.
    pub indices: SmallVec<[IndexBinding; 2]>,
}

impl TensorRead {
    /// Create a read with direct index-variable bindings.
    #[must_use]
    pub fn new(tensor: Var, indices: impl IntoIterator<Item = IndexBinding>) -> Self {
        Self {
            tensor,
            indices: indices.into_iter().collect(),
        }
    }

    /// The read's rank.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.indices.len()
    }

    /// Position of the first binding mentioning `var`, if any.
    #[must_use]
    pub fn position_of(&self, var: &IndexVar) -> Option<usize> {
        self.indices.iter().position(|b| match b {
            IndexBinding::Var(v) => v == var,
            IndexBinding::Endpoint { .. } => false,
        })
    }
}

impl fmt::Display for TensorRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.tensor)?;
        for (i, b) in self.indices.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{b}")?;
        }
        write!(f, ")")
    }
}

/// A scalar expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Integer literal.
    IntLit(i64),
    /// Float literal.
    FloatLit(f64),
    /// Read of a scalar variable.
    VarRead(Var),
    /// Load from a buffer at a computed index.
    Load {
        /// The buffer variable.
        buffer: Var,
        /// The element index.
        index: Box<Expr>,
    },
    /// Arithmetic negation.
    Neg(Box<Expr>),
    /// Binary arithmetic.
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// A symbolic tensor read; only valid inside an [`IndexExpr`].
    TensorRead(TensorRead),
}

impl Expr {
    /// Integer literal.
    #[must_use]
    pub fn int(v: i64) -> Self {
        Self::IntLit(v)
    }

    /// Float literal.
    #[must_use]
    pub fn float(v: f64) -> Self {
        Self::FloatLit(v)
    }

    /// Variable read.
    #[must_use]
    pub fn var(v: Var) -> Self {
        Self::VarRead(v)
    }

    /// Buffer load.
    #[must_use]
    pub fn load(buffer: Var, index: Expr) -> Self {
        Self::Load {
            buffer,
            index: Box::new(index),
        }
    }

    /// `a + b`.
    #[must_use]
    pub fn add(a: Expr, b: Expr) -> Self {
        Self::Binary(BinOp::Add, Box::new(a), Box::new(b))
    }

    /// `a - b`.
    #[must_use]
    pub fn sub(a: Expr, b: Expr) -> Self {
        Self::Binary(BinOp::Sub, Box::new(a), Box::new(b))
    }

    /// `a * b`.
    #[must_use]
    pub fn mul(a: Expr, b: Expr) -> Self {
        Self::Binary(BinOp::Mul, Box::new(a), Box::new(b))
    }

    /// `-a`.
    #[must_use]
    pub fn neg(a: Expr) -> Self {
        Self::Neg(Box::new(a))
    }

    /// A symbolic read `tensor(bindings...)`.
    #[must_use]
    pub fn read(tensor: Var, indices: impl IntoIterator<Item = IndexBinding>) -> Self {
        Self::TensorRead(TensorRead::new(tensor, indices))
    }

    /// Visit every tensor read in this expression, left to right.
    pub fn for_each_read<'a>(&'a self, f: &mut impl FnMut(&'a TensorRead)) {
        match self {
            Self::TensorRead(read) => f(read),
            Self::Neg(e) => e.for_each_read(f),
            Self::Binary(_, a, b) => {
                a.for_each_read(f);
                b.for_each_read(f);
            }
            Self::Load { index, .. } => index.for_each_read(f),
            Self::IntLit(_) | Self::FloatLit(_) | Self::VarRead(_) => {}
        }
    }

    /// Sum a nonempty sequence of expressions.
    ///
    /// Returns `None` for an empty sequence.
    #[must_use]
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        terms.into_iter().reduce(Expr::add)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IntLit(v) => write!(f, "{v}"),
            Self::FloatLit(v) => write!(f, "{v:?}"),
            Self::VarRead(v) => write!(f, "{v}"),
            Self::Load { buffer, index } => write!(f, "{buffer}[{index}]"),
            Self::Neg(e) => write!(f, "-({e})"),
            Self::Binary(op, a, b) => write!(f, "({a} {} {b})", op.symbol()),
            Self::TensorRead(read) => write!(f, "{read}"),
        }
    }
}

/// A tensor-algebra index expression: `(result_vars) value`, where `value`
/// is a sum of products of tensor reads over the result and reduction
/// variables. This is the input to subset-loop generation.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexExpr {
    /// The free variables of the result, outermost first.
    pub result_vars: Vec<IndexVar>,
    /// The scalar value computed at each result location.
    pub value: Expr,
    /// Source context for diagnostics.
    pub span: Span,
}

impl IndexExpr {
    /// Create an index expression.
    #[must_use]
    pub fn new(result_vars: Vec<IndexVar>, value: Expr) -> Self {
        Self {
            result_vars,
            value,
            span: Span::DUMMY,
        }
    }

    /// Attach a source span.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The reduction variables of the value, in first-occurrence order.
    #[must_use]
    pub fn reduction_vars(&self) -> Vec<IndexVar> {
        let mut seen: Vec<IndexVar> = Vec::new();
        self.value.for_each_read(&mut |read| {
            for binding in &read.indices {
                let var = binding.index_var();
                if var.is_reduction() && !seen.contains(var) && !self.result_vars.contains(var) {
                    seen.push(var.clone());
                }
            }
        });
        seen
    }
}

impl fmt::Display for IndexExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.result_vars.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ") {}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IndexSet, ScalarType, Type};

    fn matrix(name: &str) -> Var {
        Var::new(
            tangle_intern::Symbol::intern(name),
            Type::tensor(
                ScalarType::Float,
                [IndexSet::set("points"), IndexSet::set("points")],
            ),
        )
    }

    #[test]
    fn reduction_vars_in_occurrence_order() {
        let i = IndexVar::free("i", IndexSet::set("points"));
        let j = IndexVar::reduction("j", IndexSet::set("points"));

        let a = matrix("A");
        let x = Var::new(
            tangle_intern::Symbol::intern("x"),
            Type::tensor(ScalarType::Float, [IndexSet::set("points")]),
        );

        // c(i) = A(i,j) * x(j)
        let value = Expr::mul(
            Expr::read(a, [IndexBinding::Var(i.clone()), IndexBinding::Var(j.clone())]),
            Expr::read(x, [IndexBinding::Var(j.clone())]),
        );
        let iexpr = IndexExpr::new(vec![i], value);

        assert_eq!(iexpr.reduction_vars(), vec![j]);
    }

    #[test]
    fn display_reads_infix() {
        let i = IndexVar::free("i", IndexSet::set("points"));
        let j = IndexVar::free("j", IndexSet::set("points"));
        let read = Expr::read(
            matrix("A"),
            [IndexBinding::Var(i), IndexBinding::Var(j)],
        );
        assert_eq!(read.to_string(), "A(i,j)");
    }

    #[test]
    fn sum_folds_left() {
        let e = Expr::sum([Expr::int(1), Expr::int(2), Expr::int(3)]).unwrap();
        assert_eq!(e.to_string(), "((1 + 2) + 3)");
        assert!(Expr::sum(std::iter::empty()).is_none());
    }
}
