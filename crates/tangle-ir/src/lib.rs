//! # Tangle IR
//!
//! The typed intermediate representation sitting between the front end and
//! the sparse loop lowering. The IR has three layers:
//!
//! - **Index structure**: [`IndexSet`] domains and identity-keyed
//!   [`IndexVar`]s (free or reduction) describing the dimensions a tensor
//!   expression ranges over.
//! - **Expressions**: scalar [`Expr`] trees plus [`IndexExpr`], the
//!   tensor-algebra node (a sum of products of [`TensorRead`]s indexed by
//!   shared index variables) that the lowering consumes.
//! - **Statements**: the [`Stmt`] vocabulary the lowering produces —
//!   variable initialization, counted loops, and stores with a
//!   [`CompoundOperator`] deciding assign-vs-accumulate semantics.
//!
//! Sparse structure enters through [`TensorIndex`]: a compressed incidence
//! mapping (offsets array + sink-coordinate array) from a source element to
//! the ordered set of sinks it is related to. Tensor indices and other
//! global declarations live in the [`Environment`], whose registration
//! methods are idempotent by identity.
//!
//! ## Pipeline position
//!
//! ```text
//! Front end (parsed, typed)
//!     |
//!     v
//! [Tangle IR]   <- this crate
//!     |
//!     v
//! [tangle-lower]  index expressions -> subset loops -> statements
//!     |
//!     v
//! Backends (tangle-exec reference interpreter)
//! ```

#![warn(missing_docs)]

pub mod env;
pub mod expr;
pub mod stmt;
pub mod tensor_index;

pub use env::Environment;
pub use expr::{BinOp, Expr, IndexBinding, IndexExpr, TensorRead};
pub use stmt::{CompoundOperator, Stmt};
pub use tensor_index::TensorIndex;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use tangle_intern::Symbol;

/// Scalar component types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// Signed integer.
    Int,
    /// Double-precision float.
    Float,
    /// Boolean.
    Bool,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Bool => f.write_str("bool"),
        }
    }
}

/// The domain an index variable ranges over.
///
/// Either a named element set whose cardinality is known only at binding
/// time, or a static range known at compile time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexSet {
    /// A named element set (e.g. `points`); size bound at runtime.
    Set(Symbol),
    /// A static integer range `0..n`.
    Range(u32),
}

impl IndexSet {
    /// Create a set-backed domain.
    #[must_use]
    pub fn set(name: &str) -> Self {
        Self::Set(Symbol::intern(name))
    }

    /// The variable holding this domain's cardinality, for set-backed
    /// domains. Static ranges have no length variable.
    #[must_use]
    pub fn length_var(&self) -> Option<Var> {
        match self {
            Self::Set(name) => Some(Var::scalar(
                Symbol::intern(&format!("{name}_len")),
                ScalarType::Int,
            )),
            Self::Range(_) => None,
        }
    }

    /// An expression evaluating to this domain's cardinality.
    #[must_use]
    pub fn length_expr(&self) -> Expr {
        match self {
            Self::Set(name) => Expr::var(Var::scalar(
                Symbol::intern(&format!("{name}_len")),
                ScalarType::Int,
            )),
            Self::Range(n) => Expr::int(i64::from(*n)),
        }
    }
}

impl fmt::Display for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(name) => write!(f, "{name}"),
            Self::Range(n) => write!(f, "0:{n}"),
        }
    }
}

/// The reduction operator of a reduction index variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReductionOp {
    /// Sum reduction.
    Add,
}

/// The role of an index variable in an index expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// A free variable: appears in the result.
    Free,
    /// A reduction variable: summed out of the result.
    Reduction(ReductionOp),
}

static NEXT_INDEX_VAR: AtomicU32 = AtomicU32::new(0);

/// A named dimension of an index expression.
///
/// Index variables are identity-keyed: two variables are equal only if they
/// came from the same construction, never by structural comparison. Copies
/// of one `IndexVar` all denote the same dimension.
#[derive(Clone, Debug)]
pub struct IndexVar {
    id: u32,
    name: Symbol,
    domain: IndexSet,
    role: Role,
}

impl IndexVar {
    /// Create a free index variable over a domain.
    #[must_use]
    pub fn free(name: &str, domain: IndexSet) -> Self {
        Self {
            id: NEXT_INDEX_VAR.fetch_add(1, Ordering::Relaxed),
            name: Symbol::intern(name),
            domain,
            role: Role::Free,
        }
    }

    /// Create a sum-reduction index variable over a domain.
    #[must_use]
    pub fn reduction(name: &str, domain: IndexSet) -> Self {
        Self {
            id: NEXT_INDEX_VAR.fetch_add(1, Ordering::Relaxed),
            name: Symbol::intern(name),
            domain,
            role: Role::Reduction(ReductionOp::Add),
        }
    }

    /// The variable's name.
    #[must_use]
    pub fn name(&self) -> Symbol {
        self.name
    }

    /// The domain this variable ranges over.
    #[must_use]
    pub fn domain(&self) -> &IndexSet {
        &self.domain
    }

    /// The variable's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Check whether this is a reduction variable.
    #[must_use]
    pub fn is_reduction(&self) -> bool {
        matches!(self.role, Role::Reduction(_))
    }
}

impl PartialEq for IndexVar {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for IndexVar {}

impl std::hash::Hash for IndexVar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for IndexVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A tensor type: a scalar component replicated over index-set dimensions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorType {
    /// The component type.
    pub component: ScalarType,
    /// The dimensions, outermost first.
    pub dims: SmallVec<[IndexSet; 2]>,
}

impl TensorType {
    /// The tensor's rank.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

/// The type of a variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// A plain scalar.
    Scalar(ScalarType),
    /// A tensor over index-set dimensions.
    Tensor(TensorType),
}

impl Type {
    /// Create a tensor type.
    #[must_use]
    pub fn tensor(component: ScalarType, dims: impl IntoIterator<Item = IndexSet>) -> Self {
        Self::Tensor(TensorType {
            component,
            dims: dims.into_iter().collect(),
        })
    }

    /// The tensor dimensions, or an empty slice for scalars.
    #[must_use]
    pub fn dims(&self) -> &[IndexSet] {
        match self {
            Self::Scalar(_) => &[],
            Self::Tensor(t) => &t.dims,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s}"),
            Self::Tensor(t) => {
                write!(f, "tensor[")?;
                for (i, dim) in t.dims.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{dim}")?;
                }
                write!(f, "]({})", t.component)
            }
        }
    }
}

/// A named, typed storage symbol: an argument, temporary, induction
/// variable, or global buffer.
///
/// Equality is by name and type; within one lowering, a name denotes one
/// storage location.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Var {
    name: Symbol,
    ty: Type,
}

impl Var {
    /// Create a variable.
    #[must_use]
    pub fn new(name: Symbol, ty: Type) -> Self {
        Self { name, ty }
    }

    /// Create a scalar variable.
    #[must_use]
    pub fn scalar(name: Symbol, component: ScalarType) -> Self {
        Self {
            name,
            ty: Type::Scalar(component),
        }
    }

    /// Create an integer scalar variable from a string name.
    #[must_use]
    pub fn int(name: &str) -> Self {
        Self::scalar(Symbol::intern(name), ScalarType::Int)
    }

    /// The variable's name.
    #[must_use]
    pub fn name(&self) -> Symbol {
        self.name
    }

    /// The variable's type.
    #[must_use]
    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_var_equality_is_identity() {
        let points = IndexSet::set("points");
        let a = IndexVar::free("i", points.clone());
        let b = IndexVar::free("i", points);

        // Same name and domain, distinct constructions.
        assert_ne!(a, b);
        // Clones share identity.
        assert_eq!(a, a.clone());
    }

    #[test]
    fn set_domain_has_length_var() {
        let dom = IndexSet::set("springs");
        let len = dom.length_var().unwrap();
        assert_eq!(len.name().as_str(), "springs_len");

        assert!(IndexSet::Range(8).length_var().is_none());
        assert_eq!(IndexSet::Range(8).length_expr(), Expr::int(8));
    }

    #[test]
    fn type_display() {
        let ty = Type::tensor(
            ScalarType::Float,
            [IndexSet::set("points"), IndexSet::set("points")],
        );
        assert_eq!(ty.to_string(), "tensor[points,points](float)");
    }
}
