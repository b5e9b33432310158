//! Subset-loop generation.
//!
//! [`create_subset_loops`] is the algorithmic heart of the lowering. Given
//! an index expression and the current (possibly linked) loop, it decides
//! how many distinct traversals the expression needs at this loop level and
//! what each traversal computes:
//!
//! 1. every term is assigned its *access-key set*: the identity of the
//!    (incidence index, source variable, endpoint offset) lookups that
//!    resolve the current loop's index variable for the term's sparse
//!    reads (dense reads contribute no key);
//! 2. terms with identical key-sets are grouped and summed in one pass;
//!    terms with differing key-sets get separate [`SubsetLoop`]s, since
//!    one traversal cannot drive two different sparsity structures without
//!    skipping or revisiting locations;
//! 3. per group, one [`TensorIndexVar`] is created per distinct lookup,
//!    each term's reads are rewritten into loads through the lookup's
//!    coordinate variable (sparse) or the loop induction variables
//!    (dense), and the destination location is expressed with the same
//!    variables;
//! 4. a loop over a reduction variable always accumulates; otherwise the
//!    first emitted loop assigns and every later loop, whose destinations
//!    may alias locations an earlier loop wrote, accumulates.
//!
//! Sink variables of lookups resolving the current index variable are all
//! merged into the loop's single induction variable; the conservative
//! merge rule requires their sink domains to be equal, and a mismatch is
//! an internal error. Globals needed by the generated code (domain length
//! variables) are registered with the environment idempotently, so
//! repeated lowering of one expression is safe.

use std::fmt;

use smallvec::SmallVec;
use tracing::{debug, trace};

use tangle_ir::{
    CompoundOperator, Environment, Expr, IndexBinding, IndexExpr, IndexSet, IndexVar, TensorIndex,
    TensorRead, Var,
};

use crate::error::LowerError;
use crate::loops::{IndexVariableLoop, SubsetLoop, TensorIndexVar};

/// The identity of one sparse lookup: (incidence index, source variable,
/// endpoint offset).
type AccessKey = (&'static str, &'static str, Option<u32>);

/// One sparse lookup some read needs, before it is materialized as a
/// [`TensorIndexVar`].
#[derive(Clone, Debug)]
struct Access {
    index: TensorIndex,
    source: Var,
    offset: Option<u32>,
    tensor: Var,
}

impl Access {
    fn key(&self) -> AccessKey {
        (
            self.index.name().as_str(),
            self.source.name().as_str(),
            self.offset,
        )
    }
}

/// How one tensor read resolves the current loop level.
struct ReadClass {
    /// The lookup driving the loop's index variable, for sparse reads.
    traversal: Option<Access>,
    /// Endpoint lookups resolving individual read positions.
    gathers: Vec<Access>,
}

/// The lookups one term needs, deduplicated by key.
#[derive(Default)]
struct TermAnalysis {
    traversals: SmallVec<[Access; 2]>,
    gathers: SmallVec<[Access; 2]>,
}

impl TermAnalysis {
    fn merge(&mut self, class: ReadClass) {
        if let Some(access) = class.traversal {
            push_unique(&mut self.traversals, access);
        }
        for access in class.gathers {
            push_unique(&mut self.gathers, access);
        }
    }

    /// The term's access-key set, in a canonical order.
    fn key_set(&self) -> Vec<AccessKey> {
        let mut keys: Vec<AccessKey> = self.traversals.iter().map(Access::key).collect();
        keys.sort_unstable();
        keys
    }
}

fn push_unique(accesses: &mut SmallVec<[Access; 2]>, access: Access) {
    if !accesses.iter().any(|a| a.key() == access.key()) {
        accesses.push(access);
    }
}

fn unsupported(expr: &dyn fmt::Display, reason: &str) -> LowerError {
    LowerError::Unsupported {
        expr: expr.to_string(),
        reason: reason.to_string(),
    }
}

fn internal(expr: &dyn fmt::Display, reason: &str) -> LowerError {
    LowerError::Internal {
        expr: expr.to_string(),
        reason: reason.to_string(),
    }
}

/// Split a sum-of-terms value into its terms, pushing negation down into
/// subtracted terms.
fn flatten_terms(expr: &Expr, negate: bool, out: &mut Vec<Expr>) {
    match expr {
        Expr::Binary(tangle_ir::BinOp::Add, a, b) => {
            flatten_terms(a, negate, out);
            flatten_terms(b, negate, out);
        }
        Expr::Binary(tangle_ir::BinOp::Sub, a, b) => {
            flatten_terms(a, negate, out);
            flatten_terms(b, !negate, out);
        }
        Expr::Neg(e) => flatten_terms(e, !negate, out),
        other => out.push(if negate {
            Expr::neg(other.clone())
        } else {
            other.clone()
        }),
    }
}

/// Decide how `read` resolves the current loop's index variable and which
/// endpoint lookups it needs.
fn classify_read(
    read: &TensorRead,
    loop_: &IndexVariableLoop,
    env: &Environment,
) -> Result<ReadClass, LowerError> {
    let iv = loop_.index_var();
    let mut class = ReadClass {
        traversal: None,
        gathers: Vec::new(),
    };

    for (dim, binding) in read.indices.iter().enumerate() {
        match binding {
            IndexBinding::Var(v) if v == iv => {
                if read.rank() < 2 {
                    continue; // vectors are traversed densely
                }
                let dims = read.tensor.ty().dims();
                if !matches!(dims.get(dim), Some(IndexSet::Set(_))) {
                    continue; // statically sized dimension
                }
                if dim == 0 {
                    if loop_.is_linked() {
                        return Err(unsupported(read, "transposed access to a sparse tensor"));
                    }
                    continue; // outermost dimension: rows are scanned densely
                }
                if !loop_.is_linked() {
                    return Err(unsupported(
                        read,
                        "sparse dimension with no enclosing loop to drive it",
                    ));
                }
                let parent = loop_.linked_loop();
                if read.position_of(parent.index_var()).is_none() {
                    return Err(unsupported(
                        read,
                        "no access path from the enclosing loop to this read",
                    ));
                }
                let Some(index) = env.tensor_index(read.tensor.name()) else {
                    return Err(unsupported(
                        read,
                        "no sparse incidence index is registered for this tensor",
                    ));
                };
                class.traversal = Some(Access {
                    index: index.clone(),
                    source: parent.induction_var().clone(),
                    offset: None,
                    tensor: read.tensor.clone(),
                });
            }
            IndexBinding::Var(_) => {}
            IndexBinding::Endpoint { edge, position } => {
                let levels = loop_.levels();
                let Some(level) = levels.iter().find(|l| l.index_var() == edge) else {
                    return Err(internal(
                        read,
                        "endpoint edge variable is not bound by any enclosing loop",
                    ));
                };
                let IndexSet::Set(edge_set) = edge.domain() else {
                    return Err(unsupported(
                        read,
                        "endpoint access on a statically sized domain",
                    ));
                };
                let Some(index) = env.tensor_index(*edge_set) else {
                    return Err(unsupported(
                        read,
                        "edge set has no registered endpoint index",
                    ));
                };
                class.gathers.push(Access {
                    index: index.clone(),
                    source: level.induction_var().clone(),
                    offset: Some(*position),
                    tensor: read.tensor.clone(),
                });
            }
        }
    }
    Ok(class)
}

fn analyze_term(
    term: &Expr,
    loop_: &IndexVariableLoop,
    env: &Environment,
) -> Result<TermAnalysis, LowerError> {
    let mut reads = Vec::new();
    term.for_each_read(&mut |r| reads.push(r));

    let mut analysis = TermAnalysis::default();
    for read in reads {
        analysis.merge(classify_read(read, loop_, env)?);
    }
    Ok(analysis)
}

fn make_tensor_index_var(access: &Access, iv: &IndexVar) -> TensorIndexVar {
    let name = access.tensor.name();
    match access.offset {
        None => TensorIndexVar::new(
            iv.name().as_str(),
            name.as_str(),
            access.source.clone(),
            access.index.clone(),
        ),
        Some(position) => TensorIndexVar::at_endpoint(
            iv.name().as_str(),
            name.as_str(),
            access.source.clone(),
            access.index.clone(),
            position,
        ),
    }
}

fn find_tensor_index_var<'a>(
    tivs: &'a [TensorIndexVar],
    access: &Access,
) -> Option<&'a TensorIndexVar> {
    let key = (access.index.name(), access.source.name(), access.offset);
    tivs.iter().find(|t| t.key() == key)
}

/// The induction variable of the loop level ranging over `var`, if any.
fn level_induction(var: &IndexVar, loop_: &IndexVariableLoop) -> Option<Var> {
    loop_
        .levels()
        .iter()
        .find(|l| l.index_var() == var)
        .map(|l| l.induction_var().clone())
}

/// The expression for the element a read binding denotes.
fn position_expr(
    binding: &IndexBinding,
    loop_: &IndexVariableLoop,
    tivs: &[TensorIndexVar],
    read: &TensorRead,
) -> Result<Expr, LowerError> {
    match binding {
        IndexBinding::Var(v) => level_induction(v, loop_)
            .map(Expr::var)
            .ok_or_else(|| internal(read, "index variable has no resolvable access")),
        IndexBinding::Endpoint { edge, position } => {
            let source = level_induction(edge, loop_)
                .ok_or_else(|| internal(read, "endpoint edge variable has no loop level"))?;
            let tiv = tivs
                .iter()
                .find(|t| {
                    t.offset() == Some(*position) && t.source_var().name() == source.name()
                })
                .ok_or_else(|| internal(read, "missing endpoint lookup for read position"))?;
            Ok(Expr::var(tiv.sink_var().clone()))
        }
    }
}

/// Rewrite one read into a load through the group's lookups.
///
/// A sparse tensor variable names its nonzero-values buffer, so a read
/// driven by a traversal lookup loads at the lookup's coordinate. Dense
/// reads linearize their resolved positions row-major.
fn rewrite_read(
    read: &TensorRead,
    loop_: &IndexVariableLoop,
    env: &mut Environment,
    tivs: &[TensorIndexVar],
) -> Result<Expr, LowerError> {
    let class = classify_read(read, loop_, env)?;
    if let Some(access) = class.traversal {
        let tiv = find_tensor_index_var(tivs, &access)
            .ok_or_else(|| internal(read, "missing lookup for sparse read"))?;
        return Ok(Expr::load(
            read.tensor.clone(),
            Expr::var(tiv.coordinate_var().clone()),
        ));
    }

    if read.rank() >= 2 && env.has_tensor_index(read.tensor.name()) {
        return Err(unsupported(
            read,
            "read does not follow the tensor's sparse structure",
        ));
    }

    let dims = read.tensor.ty().dims().to_vec();
    let mut index: Option<Expr> = None;
    for (dim, binding) in read.indices.iter().enumerate() {
        let pos = position_expr(binding, loop_, tivs, read)?;
        index = Some(match index {
            None => pos,
            Some(acc) => {
                let domain = dims
                    .get(dim)
                    .ok_or_else(|| internal(read, "read rank exceeds tensor rank"))?;
                if let Some(len) = domain.length_var() {
                    env.add_extern(len);
                }
                Expr::add(Expr::mul(acc, domain.length_expr()), pos)
            }
        });
    }
    match index {
        Some(index) => Ok(Expr::load(read.tensor.clone(), index)),
        None => Ok(Expr::var(read.tensor.clone())),
    }
}

fn rewrite_expr(
    expr: &Expr,
    loop_: &IndexVariableLoop,
    env: &mut Environment,
    tivs: &[TensorIndexVar],
) -> Result<Expr, LowerError> {
    match expr {
        Expr::TensorRead(read) => rewrite_read(read, loop_, env, tivs),
        Expr::Neg(e) => Ok(Expr::neg(rewrite_expr(e, loop_, env, tivs)?)),
        Expr::Binary(op, a, b) => Ok(Expr::Binary(
            *op,
            Box::new(rewrite_expr(a, loop_, env, tivs)?),
            Box::new(rewrite_expr(b, loop_, env, tivs)?),
        )),
        Expr::Load { buffer, index } => Ok(Expr::load(
            buffer.clone(),
            rewrite_expr(index, loop_, env, tivs)?,
        )),
        Expr::IntLit(_) | Expr::FloatLit(_) | Expr::VarRead(_) => Ok(expr.clone()),
    }
}

/// The linearized output location, expressed with the loop nest's
/// induction variables. Registers the length externs the linearization
/// needs.
fn destination_expr(
    index_expr: &IndexExpr,
    loop_: &IndexVariableLoop,
    env: &mut Environment,
) -> Result<Expr, LowerError> {
    let free = &index_expr.result_vars;
    if free.len() > 2 {
        return Err(unsupported(index_expr, "results of rank greater than two"));
    }

    let mut dest: Option<Expr> = None;
    for var in free {
        let pos = level_induction(var, loop_)
            .map(Expr::var)
            .ok_or_else(|| internal(index_expr, "result index variable has no loop level"))?;
        dest = Some(match dest {
            None => pos,
            Some(acc) => {
                if let Some(len) = var.domain().length_var() {
                    env.add_extern(len);
                }
                Expr::add(Expr::mul(acc, var.domain().length_expr()), pos)
            }
        });
    }
    Ok(dest.unwrap_or(Expr::int(0)))
}

/// Partition an index expression's terms by shared sparsity structure and
/// emit one [`SubsetLoop`] per partition, in first-occurrence order.
///
/// `loop_` is the innermost loop level being generated for; when it is
/// linked, every traversal lookup is sourced from the parent loop's
/// induction variable, which bounds the traversal to the parent's current
/// element. Length externs needed by the generated code are registered
/// with `env`; registration is idempotent, so lowering the same
/// expression twice yields identical output and no duplicate
/// declarations.
///
/// # Panics
///
/// Panics if `loop_` is undefined.
pub fn create_subset_loops(
    index_expr: &IndexExpr,
    loop_: &IndexVariableLoop,
    env: &mut Environment,
) -> Result<Vec<SubsetLoop>, LowerError> {
    let iv = loop_.index_var().clone();

    let mut terms = Vec::new();
    flatten_terms(&index_expr.value, false, &mut terms);

    // Group terms by access-key set, preserving first-occurrence order so
    // the output is deterministic.
    let mut groups: Vec<(Vec<AccessKey>, Vec<Expr>)> = Vec::new();
    for term in terms {
        let key = analyze_term(&term, loop_, env)?.key_set();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => group.push(term),
            None => groups.push((key, vec![term])),
        }
    }
    trace!(expr = %index_expr, groups = groups.len(), "partitioned terms by access-key set");

    let mut subset_loops = Vec::with_capacity(groups.len());
    for (emitted, (_, group_terms)) in groups.iter().enumerate() {
        // One lookup per distinct key, traversals ahead of endpoint
        // gathers.
        let mut traversals: SmallVec<[Access; 2]> = SmallVec::new();
        let mut gathers: SmallVec<[Access; 2]> = SmallVec::new();
        for term in group_terms {
            let analysis = analyze_term(term, loop_, env)?;
            for access in analysis.traversals {
                push_unique(&mut traversals, access);
            }
            for access in analysis.gathers {
                push_unique(&mut gathers, access);
            }
        }

        // All sinks resolving the index variable are merged into one
        // induction variable, which requires their domains to agree.
        for access in &traversals {
            if access.index.sink_dimension() != iv.domain() {
                return Err(internal(
                    index_expr,
                    "merged sink variables have mismatched domains",
                ));
            }
        }

        let mut accesses = traversals.into_vec();
        accesses.extend(gathers);
        let tivs: Vec<TensorIndexVar> = accesses
            .iter()
            .map(|a| make_tensor_index_var(a, &iv))
            .collect();

        let mut rewritten = Vec::with_capacity(group_terms.len());
        for term in group_terms {
            rewritten.push(rewrite_expr(term, loop_, env, &tivs)?);
        }
        let compute = match Expr::sum(rewritten) {
            Some(e) => e,
            None => return Err(internal(index_expr, "subset loop with no terms")),
        };

        let destination = destination_expr(index_expr, loop_, env)?;

        let mut subset_loop = SubsetLoop::new(tivs, compute, destination);
        if iv.is_reduction() || emitted > 0 {
            subset_loop.set_compound_operator(CompoundOperator::Add);
        }
        subset_loops.push(subset_loop);
    }

    debug!(expr = %index_expr, loops = subset_loops.len(), "generated subset loops");
    Ok(subset_loops)
}
