//! Statement lowering for index expressions.
//!
//! [`lower_index_expr_stmt`] turns `target = index_expr` into executable
//! statements: it builds the loop nest for the expression's free and
//! reduction variables (outermost first, inner levels linked to their
//! parent), calls [`create_subset_loops`] at the innermost level, and
//! materializes each [`SubsetLoop`] as iteration over the relevant
//! coordinate range, the coordinate/sink initialization statements in
//! required order, and a store or accumulate at the destination.
//!
//! Loop nests of one or two levels are materialized here; deeper nests
//! and subset loops that would have to intersect two ranged traversals
//! are unsupported constructs.

use tracing::debug;

use tangle_ir::{
    CompoundOperator, Environment, Expr, IndexExpr, IndexVar, ScalarType, Stmt, Type, Var,
};

use crate::error::LowerError;
use crate::loops::{IndexVariableLoop, SubsetLoop, TensorIndexVar};
use crate::subset::create_subset_loops;

fn unsupported(index_expr: &IndexExpr, reason: &str) -> LowerError {
    LowerError::Unsupported {
        expr: index_expr.to_string(),
        reason: reason.to_string(),
    }
}

fn internal(index_expr: &IndexExpr, reason: &str) -> LowerError {
    LowerError::Internal {
        expr: index_expr.to_string(),
        reason: reason.to_string(),
    }
}

fn zero_literal(target: &Var) -> Expr {
    let component = match target.ty() {
        Type::Scalar(s) => *s,
        Type::Tensor(t) => t.component,
    };
    match component {
        ScalarType::Float => Expr::float(0.0),
        ScalarType::Int | ScalarType::Bool => Expr::int(0),
    }
}

/// Zero the whole target buffer ahead of accumulating loops.
fn zero_init(target: &Var, index_expr: &IndexExpr) -> Stmt {
    let mut total = Expr::int(1);
    for var in &index_expr.result_vars {
        total = Expr::mul(total, var.domain().length_expr());
    }
    let zero_var = Var::int(&format!("{}_zero", target.name()));
    Stmt::ForRange {
        var: zero_var.clone(),
        lo: Expr::int(0),
        hi: total,
        body: vec![Stmt::Store {
            buffer: target.clone(),
            index: Expr::var(zero_var),
            value: zero_literal(target),
            op: CompoundOperator::Assign,
        }],
    }
}

/// Materialize one subset loop inside the innermost loop level.
fn materialize(
    subset_loop: &SubsetLoop,
    innermost: &IndexVariableLoop,
    index_expr: &IndexExpr,
    target: &Var,
) -> Result<Stmt, LowerError> {
    let store = Stmt::Store {
        buffer: target.clone(),
        index: subset_loop.destination().clone(),
        value: subset_loop.compute_expr().clone(),
        op: subset_loop.compound_operator(),
    };

    let (ranged, pinned): (Vec<&TensorIndexVar>, Vec<&TensorIndexVar>) = subset_loop
        .tensor_index_vars()
        .iter()
        .partition(|t| t.offset().is_none());

    // Endpoint lookups address a single entry each: coordinate first,
    // then sink.
    let mut pinned_inits = Vec::with_capacity(pinned.len() * 2);
    for tiv in &pinned {
        pinned_inits.push(tiv.init_coordinate_var());
        pinned_inits.push(tiv.init_sink_var());
    }

    if !innermost.is_linked() {
        if !ranged.is_empty() {
            return Err(internal(
                index_expr,
                "ranged lookup generated for an unlinked loop",
            ));
        }
        let mut body = pinned_inits;
        body.push(store);
        return Ok(Stmt::Block(body));
    }

    match ranged.as_slice() {
        // Dense traversal of the inner index variable's full domain.
        [] => {
            let mut body = pinned_inits;
            body.push(store);
            Ok(Stmt::ForRange {
                var: innermost.induction_var().clone(),
                lo: Expr::int(0),
                hi: innermost.index_var().domain().length_expr(),
                body,
            })
        }
        // Sparse traversal: iterate the coordinate range, merging the
        // lookup's sink into the loop's induction variable.
        [tiv] => {
            let mut body = vec![tiv.init_sink_var_as(innermost.induction_var())];
            body.extend(pinned_inits);
            body.push(store);
            Ok(Stmt::ForRange {
                var: tiv.coordinate_var().clone(),
                lo: tiv.load_coordinate(0),
                hi: tiv.load_coordinate_end(),
                body,
            })
        }
        _ => Err(unsupported(
            index_expr,
            "intersecting two sparse traversals in one loop",
        )),
    }
}

/// Lower `target = index_expr` to statements.
///
/// Registers `target` as a temporary and the loop domains' length
/// variables as externs; both registrations are idempotent.
pub fn lower_index_expr_stmt(
    target: &Var,
    index_expr: &IndexExpr,
    env: &mut Environment,
) -> Result<Vec<Stmt>, LowerError> {
    let mut vars: Vec<IndexVar> = index_expr.result_vars.clone();
    for var in index_expr.reduction_vars() {
        if !vars.contains(&var) {
            vars.push(var);
        }
    }
    if vars.is_empty() {
        return Err(unsupported(index_expr, "expression has no index variables"));
    }
    if vars.len() > 2 {
        return Err(unsupported(index_expr, "loop nests deeper than two levels"));
    }

    env.add_temporary(target.clone());
    for var in &vars {
        if let Some(len) = var.domain().length_var() {
            env.add_extern(len);
        }
    }

    let outer = IndexVariableLoop::new(vars[0].clone());
    let (innermost, subset_loops) = if vars.len() == 2 {
        let inner = IndexVariableLoop::linked(vars[1].clone(), outer.clone());
        let loops = create_subset_loops(index_expr, &inner, env)?;
        (inner, loops)
    } else {
        let loops = create_subset_loops(index_expr, &outer, env)?;
        (outer.clone(), loops)
    };

    let needs_zero = subset_loops
        .iter()
        .any(|sl| sl.compound_operator() == CompoundOperator::Add);

    let mut body = Vec::with_capacity(subset_loops.len());
    for subset_loop in &subset_loops {
        body.push(materialize(subset_loop, &innermost, index_expr, target)?);
    }

    let nest = Stmt::ForRange {
        var: outer.induction_var().clone(),
        lo: Expr::int(0),
        hi: vars[0].domain().length_expr(),
        body,
    };

    let mut stmts = Vec::new();
    if needs_zero {
        stmts.push(zero_init(target, index_expr));
    }
    stmts.push(nest);

    debug!(expr = %index_expr, target = %target, loops = subset_loops.len(), "lowered index expression");
    Ok(stmts)
}
