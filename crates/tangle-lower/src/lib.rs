//! # Tangle sparse index-expression lowering
//!
//! This crate turns tensor-algebra index expressions — sums of products of
//! tensor reads indexed by shared free/reduction index variables — into
//! concrete loop bodies that traverse only the nonzero structure implied by
//! the underlying sparse incidence indices.
//!
//! ## Pipeline position
//!
//! ```text
//! Tangle IR (index expressions) → [subset] → SubsetLoops → [index_exprs] → Stmts
//! ```
//!
//! ## How lowering works
//!
//! For each free or reduction index variable of an expression, outermost
//! first, an [`IndexVariableLoop`] is created; inner loops are *linked* to
//! their parent, meaning they traverse only the sinks reachable from the
//! parent's current position through some sparse incidence index rather
//! than the full cross product.
//!
//! At the innermost level, [`create_subset_loops`] partitions the
//! expression's terms by shared sparsity structure:
//!
//! 1. every term gets a set of *access keys* — the identity of the
//!    (incidence index, source variable, endpoint offset) lookups needed to
//!    resolve the loop's index variable for its reads;
//! 2. terms with identical key-sets share one traversal (one
//!    [`SubsetLoop`]); terms with differing key-sets get separate loops,
//!    since interleaving them would skip or revisit nonzero locations;
//! 3. the first loop that can write a destination assigns, every
//!    subsequent aliasing loop accumulates, so contributions arriving via
//!    different traversals combine correctly regardless of order;
//! 4. sink variables of lookups that denote the same logical index value
//!    are merged into the loop's single induction variable.
//!
//! The statement-lowering driver in [`index_exprs`] then materializes each
//! subset loop as guarded iteration over the relevant coordinate range,
//! the coordinate/sink initialization statements (in required order), and
//! a store/accumulate at the destination.

#![warn(missing_docs)]

pub mod error;
pub mod index_exprs;
pub mod loops;
pub mod subset;

pub use error::LowerError;
pub use index_exprs::lower_index_expr_stmt;
pub use loops::{IndexVariableLoop, SubsetLoop, TensorIndexVar};
pub use subset::create_subset_loops;
