//! End-to-end checks: lower index expressions, execute them over runtime
//! incidence structures, and compare against dense reference computations.

use tangle_exec::Function;
use tangle_graph::{diagonal_index, endpoint_index, neighbor_index, CsrIndex, EdgeSet, Set};
use tangle_intern::Symbol;
use tangle_ir::{
    Environment, Expr, IndexBinding, IndexExpr, IndexSet, IndexVar, ScalarType, TensorIndex, Type,
    Var,
};
use tangle_lower::lower_index_expr_stmt;

fn sparse_matrix(name: &str, index_name: &str, env: &mut Environment) -> Var {
    let var = Var::new(
        Symbol::intern(name),
        Type::tensor(
            ScalarType::Float,
            [IndexSet::set("points"), IndexSet::set("points")],
        ),
    );
    env.add_tensor_index(
        Symbol::intern(name),
        TensorIndex::new(
            Symbol::intern(index_name),
            IndexSet::set("points"),
            IndexSet::set("points"),
        ),
    );
    var
}

fn vector(name: &str, set: &str) -> Var {
    Var::new(
        Symbol::intern(name),
        Type::tensor(ScalarType::Float, [IndexSet::set(set)]),
    )
}

fn bind_index(f: &mut Function, index_name: &str, csr: &CsrIndex) {
    f.bind_int(&format!("{index_name}_coords"), csr.offsets().to_vec());
    f.bind_int(&format!("{index_name}_sinks"), csr.sinks().to_vec());
}

/// Dense n×n matrix from a CSR structure and its value array.
fn densify(csr: &CsrIndex, values: &[f64], n: usize) -> Vec<Vec<f64>> {
    let mut dense = vec![vec![0.0; n]; n];
    for row in 0..n {
        let lo = csr.offsets()[row] as usize;
        for (k, &col) in csr.neighbors(row).iter().enumerate() {
            dense[row][col as usize] += values[lo + k];
        }
    }
    dense
}

#[test]
fn spmv_matches_dense_reference() {
    let mut env = Environment::new();
    let a = sparse_matrix("A", "A_row2col", &mut env);
    let x = vector("x", "points");
    let c = vector("c", "points");

    let csr = CsrIndex::from_rows(&[vec![0, 1], vec![0, 1, 2], vec![1, 2]]);
    csr.validate().unwrap();
    let values = vec![2.0, -1.0, -1.0, 2.0, -1.0, -1.0, 2.0];
    let xv = vec![1.0, 2.0, 3.0];

    let i = IndexVar::free("i", IndexSet::set("points"));
    let j = IndexVar::reduction("j", IndexSet::set("points"));
    let value = Expr::mul(
        Expr::read(a, [IndexBinding::Var(i.clone()), IndexBinding::Var(j.clone())]),
        Expr::read(x, [IndexBinding::Var(j)]),
    );
    let iexpr = IndexExpr::new(vec![i], value);
    let stmts = lower_index_expr_stmt(&c, &iexpr, &mut env).unwrap();

    let mut f = Function::new(stmts);
    f.bind_len("points", 3);
    bind_index(&mut f, "A_row2col", &csr);
    f.bind_float("A", values.clone());
    f.bind_float("x", xv.clone());
    f.bind_float("c", vec![0.0; 3]);
    f.run().unwrap();

    let dense = densify(&csr, &values, 3);
    for row in 0..3 {
        let expected: f64 = (0..3).map(|col| dense[row][col] * xv[col]).sum();
        assert_eq!(f.float_buffer("c").unwrap()[row], expected);
    }
}

#[test]
fn linked_loop_visits_each_rows_sinks_in_order() {
    let mut env = Environment::new();
    let a = sparse_matrix("A", "A_row2col", &mut env);
    let x = vector("x", "points");
    let c = vector("c", "points");

    let csr = CsrIndex::from_rows(&[vec![2], vec![0, 1, 2], vec![]]);
    let nnz = csr.sinks().len();

    let i = IndexVar::free("i", IndexSet::set("points"));
    let j = IndexVar::reduction("j", IndexSet::set("points"));
    let value = Expr::mul(
        Expr::read(a, [IndexBinding::Var(i.clone()), IndexBinding::Var(j.clone())]),
        Expr::read(x, [IndexBinding::Var(j)]),
    );
    let iexpr = IndexExpr::new(vec![i], value);
    let stmts = lower_index_expr_stmt(&c, &iexpr, &mut env).unwrap();

    // With unit matrix values and x[k] = k, each row accumulates the sum
    // of its sink ids; with x all ones it accumulates its sink count.
    let mut f = Function::new(stmts.clone());
    f.bind_len("points", 3);
    bind_index(&mut f, "A_row2col", &csr);
    f.bind_float("A", vec![1.0; nnz]);
    f.bind_float("x", vec![0.0, 1.0, 2.0]);
    f.bind_float("c", vec![0.0; 3]);
    f.run().unwrap();
    assert_eq!(f.float_buffer("c").unwrap(), &[2.0, 3.0, 0.0]);

    let mut counts = Function::new(stmts);
    counts.bind_len("points", 3);
    bind_index(&mut counts, "A_row2col", &csr);
    counts.bind_float("A", vec![1.0; nnz]);
    counts.bind_float("x", vec![1.0; 3]);
    counts.bind_float("c", vec![0.0; 3]);
    counts.run().unwrap();
    // offsets[i+1] - offsets[i] iterations per row.
    assert_eq!(counts.float_buffer("c").unwrap(), &[1.0, 3.0, 0.0]);
}

#[test]
fn stiffness_assembly_matches_dense_reference() {
    // 3 points in a chain, 2 springs; each spring contributes 15a to its
    // two diagonal blocks and a to its two off-diagonal blocks.
    let mut points = Set::new("points");
    let p0 = points.add_element();
    let p1 = points.add_element();
    let p2 = points.add_element();

    let mut springs = EdgeSet::new("springs", 2);
    springs.set_mut().add_float_field("a");
    let s0 = springs.add_edge(&[p0, p1]).unwrap();
    let s1 = springs.add_edge(&[p1, p2]).unwrap();
    springs.set_mut().set_float("a", s0, 2.0).unwrap();
    springs.set_mut().set_float("a", s1, 3.0).unwrap();

    let n = points.len();
    let diag = diagonal_index(n);
    let nbr = neighbor_index(&springs, n).unwrap();

    // Per-structure value arrays, in each structure's sink order.
    let mut diag_vals = vec![0.0; n];
    let mut off_vals = vec![0.0; nbr.sinks().len()];
    for e in springs.set().elements() {
        let a = springs.set().float("a", e).unwrap();
        let eps = springs.endpoints(e).unwrap();
        let (p, q) = (eps[0] as usize, eps[1] as usize);
        diag_vals[p] += 15.0 * a;
        diag_vals[q] += 15.0 * a;
        for (u, v) in [(p, q), (q, p)] {
            let at = nbr.offsets()[u] as usize
                + nbr
                    .neighbors(u)
                    .iter()
                    .position(|&s| s as usize == v)
                    .unwrap();
            off_vals[at] += a;
        }
    }

    // K(i,j) = D(i,j) + O(i,j): two access keys, two subset loops, the
    // second accumulating.
    let mut env = Environment::new();
    let d = sparse_matrix("D", "D_diag", &mut env);
    let o = sparse_matrix("O", "O_nbr", &mut env);
    let k = Var::new(
        Symbol::intern("K"),
        Type::tensor(
            ScalarType::Float,
            [IndexSet::set("points"), IndexSet::set("points")],
        ),
    );

    let i = IndexVar::free("i", IndexSet::set("points"));
    let j = IndexVar::free("j", IndexSet::set("points"));
    let value = Expr::add(
        Expr::read(d, [IndexBinding::Var(i.clone()), IndexBinding::Var(j.clone())]),
        Expr::read(o, [IndexBinding::Var(i.clone()), IndexBinding::Var(j.clone())]),
    );
    let iexpr = IndexExpr::new(vec![i, j], value);
    let stmts = lower_index_expr_stmt(&k, &iexpr, &mut env).unwrap();

    let mut f = Function::new(stmts);
    f.bind_len("points", n);
    bind_index(&mut f, "D_diag", &diag);
    bind_index(&mut f, "O_nbr", &nbr);
    f.bind_float("D", diag_vals);
    f.bind_float("O", off_vals);
    f.bind_float("K", vec![0.0; n * n]);
    f.run().unwrap();

    // Direct dense assembly.
    let mut expected = vec![vec![0.0; n]; n];
    for e in springs.set().elements() {
        let a = springs.set().float("a", e).unwrap();
        let eps = springs.endpoints(e).unwrap();
        let (p, q) = (eps[0] as usize, eps[1] as usize);
        expected[p][p] += 15.0 * a;
        expected[p][q] += a;
        expected[q][p] += a;
        expected[q][q] += 15.0 * a;
    }

    let assembled = f.float_buffer("K").unwrap();
    for r in 0..n {
        for c in 0..n {
            assert_eq!(
                assembled[r * n + c],
                expected[r][c],
                "mismatch at ({r},{c})"
            );
        }
    }
}

#[test]
fn endpoint_gather_reads_both_ends_of_each_edge() {
    let mut points = Set::new("points");
    let p0 = points.add_element();
    let p1 = points.add_element();
    let p2 = points.add_element();

    let mut springs = EdgeSet::new("springs", 2);
    springs.add_edge(&[p0, p1]).unwrap();
    springs.add_edge(&[p1, p2]).unwrap();
    let ep = endpoint_index(&springs);

    let mut env = Environment::new();
    env.add_tensor_index(
        Symbol::intern("springs"),
        TensorIndex::new(
            Symbol::intern("springs_ep"),
            IndexSet::set("springs"),
            IndexSet::set("points"),
        ),
    );
    let x = vector("x", "points");
    let w = vector("w", "springs");

    // w(e) = x(e.p0) * x(e.p1)
    let e = IndexVar::free("e", IndexSet::set("springs"));
    let value = Expr::mul(
        Expr::read(
            x.clone(),
            [IndexBinding::Endpoint {
                edge: e.clone(),
                position: 0,
            }],
        ),
        Expr::read(
            x,
            [IndexBinding::Endpoint {
                edge: e.clone(),
                position: 1,
            }],
        ),
    );
    let iexpr = IndexExpr::new(vec![e], value);
    let stmts = lower_index_expr_stmt(&w, &iexpr, &mut env).unwrap();

    let mut f = Function::new(stmts);
    f.bind_len("springs", 2);
    bind_index(&mut f, "springs_ep", &ep);
    f.bind_float("x", vec![1.0, 2.0, 3.0]);
    f.bind_float("w", vec![0.0; 2]);
    f.run().unwrap();

    assert_eq!(f.float_buffer("w").unwrap(), &[2.0, 6.0]);
}

#[test]
fn empty_domain_runs_zero_iterations() {
    let mut env = Environment::new();
    let a = sparse_matrix("A", "A_row2col", &mut env);
    let x = vector("x", "points");
    let c = vector("c", "points");

    let csr = CsrIndex::from_rows(&[]);
    csr.validate().unwrap();

    let i = IndexVar::free("i", IndexSet::set("points"));
    let j = IndexVar::reduction("j", IndexSet::set("points"));
    let value = Expr::mul(
        Expr::read(a, [IndexBinding::Var(i.clone()), IndexBinding::Var(j.clone())]),
        Expr::read(x, [IndexBinding::Var(j)]),
    );
    let iexpr = IndexExpr::new(vec![i], value);
    let stmts = lower_index_expr_stmt(&c, &iexpr, &mut env).unwrap();

    let mut f = Function::new(stmts);
    f.bind_len("points", 0);
    bind_index(&mut f, "A_row2col", &csr);
    f.bind_float("A", Vec::new());
    f.bind_float("x", Vec::new());
    f.bind_float("c", Vec::new());
    f.run().unwrap();

    assert!(f.float_buffer("c").unwrap().is_empty());
}
