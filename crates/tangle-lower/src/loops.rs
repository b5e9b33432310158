//! Loop descriptors for index-variable traversal.
//!
//! An [`IndexVariableLoop`] describes one level of the loop nest built for
//! an index expression: the index variable it ranges over, the induction
//! variable that holds the current element, and an optional link to the
//! enclosing level. Loops are handles with shared interior state; cloning
//! one yields another handle to the same logical loop.
//!
//! A [`TensorIndexVar`] is one two-step sparse lookup inside a linked loop:
//! a *coordinate* variable locating a nonzero entry inside an incidence
//! index's coordinate range, and a *sink* variable holding the element that
//! entry points at. The coordinate variable must be initialized before the
//! sink variable is.

use std::fmt;
use std::rc::Rc;

use tangle_intern::Symbol;
use tangle_ir::{CompoundOperator, Expr, IndexVar, Stmt, TensorIndex, Var};

#[derive(Debug)]
struct LoopContent {
    index_var: IndexVar,
    induction_var: Var,
    linked: IndexVariableLoop,
}

/// One level of the loop nest for an index expression.
///
/// A loop is either *defined* (it has an index variable and an induction
/// variable) or *undefined* (the default; the terminator of a linked-loop
/// chain). Calling any accessor other than [`Self::is_defined`] on an
/// undefined loop is a contract violation and panics.
#[derive(Clone, Debug, Default)]
pub struct IndexVariableLoop {
    content: Option<Rc<LoopContent>>,
}

impl IndexVariableLoop {
    /// Create an unlinked (outermost) loop over `index_var`.
    ///
    /// The induction variable takes the index variable's name.
    #[must_use]
    pub fn new(index_var: IndexVar) -> Self {
        let induction_var = Var::int(index_var.name().as_str());
        Self {
            content: Some(Rc::new(LoopContent {
                index_var,
                induction_var,
                linked: Self::default(),
            })),
        }
    }

    /// Create a loop over `index_var` linked to (nested inside) `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is undefined.
    #[must_use]
    pub fn linked(index_var: IndexVar, parent: IndexVariableLoop) -> Self {
        assert!(parent.is_defined(), "cannot link to an undefined loop");
        let induction_var = Var::int(index_var.name().as_str());
        Self {
            content: Some(Rc::new(LoopContent {
                index_var,
                induction_var,
                linked: parent,
            })),
        }
    }

    /// Check whether the loop is defined.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.content.is_some()
    }

    fn content(&self) -> &LoopContent {
        match &self.content {
            Some(content) => content,
            None => panic!("accessed an undefined index-variable loop"),
        }
    }

    /// The index variable this loop ranges over.
    #[must_use]
    pub fn index_var(&self) -> &IndexVar {
        &self.content().index_var
    }

    /// The induction variable holding the current element.
    #[must_use]
    pub fn induction_var(&self) -> &Var {
        &self.content().induction_var
    }

    /// Check whether this loop is nested inside another.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.content().linked.is_defined()
    }

    /// The enclosing loop.
    ///
    /// # Panics
    ///
    /// Panics if the loop is unlinked.
    #[must_use]
    pub fn linked_loop(&self) -> &IndexVariableLoop {
        let linked = &self.content().linked;
        assert!(linked.is_defined(), "loop has no linked loop");
        linked
    }

    /// Number of levels in the chain ending at this loop. Always finite:
    /// links only point outward to previously constructed loops.
    #[must_use]
    pub fn depth(&self) -> usize {
        let content = self.content();
        if content.linked.is_defined() {
            1 + content.linked.depth()
        } else {
            1
        }
    }

    /// Check whether two handles denote the same logical loop.
    #[must_use]
    pub fn same_loop(&self, other: &IndexVariableLoop) -> bool {
        match (&self.content, &other.content) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// The loop nest from this level outward, innermost first.
    #[must_use]
    pub fn levels(&self) -> Vec<&IndexVariableLoop> {
        let mut levels = vec![self];
        let mut cur = self;
        while cur.is_linked() {
            cur = cur.linked_loop();
            levels.push(cur);
        }
        levels
    }
}

impl fmt::Display for IndexVariableLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            None => f.write_str("<undefined loop>"),
            Some(content) => {
                write!(f, "loop {}", content.index_var)?;
                if content.linked.is_defined() {
                    write!(f, " in {}", content.linked)?;
                }
                Ok(())
            }
        }
    }
}

/// One sparse lookup resolving a loop's index variable through an
/// incidence index.
///
/// The lookup has two steps. The coordinate variable locates a nonzero
/// entry: `coord = offsets[source]`, plus the endpoint offset when the
/// lookup addresses a single adjacent entry rather than the whole range.
/// The sink variable then resolves the entry to an element:
/// `sink = sinks[coord]`.
///
/// Two lookups are interchangeable exactly when their identity key — the
/// incidence index, the source variable, and the endpoint offset — is the
/// same.
#[derive(Clone, Debug)]
pub struct TensorIndexVar {
    source_var: Var,
    coordinate_var: Var,
    sink_var: Var,
    index: TensorIndex,
    offset: Option<u32>,
}

impl TensorIndexVar {
    /// Create a lookup traversing the full coordinate range of `index` from
    /// `source_var`.
    ///
    /// The coordinate variable is named `<source><induction><name>` and the
    /// sink variable `<induction><name>`, so `A(i,j)` inside a `j` loop
    /// sourced from `i` yields `ijA` and `jA`.
    #[must_use]
    pub fn new(induction_name: &str, name: &str, source_var: Var, index: TensorIndex) -> Self {
        let coordinate_var = Var::int(&format!("{}{induction_name}{name}", source_var.name()));
        let sink_var = Var::int(&format!("{induction_name}{name}"));
        Self {
            source_var,
            coordinate_var,
            sink_var,
            index,
            offset: None,
        }
    }

    /// Create a lookup addressing the single entry `position` places into
    /// the source's coordinate range, as for an edge's `position`-th
    /// endpoint.
    #[must_use]
    pub fn at_endpoint(
        induction_name: &str,
        name: &str,
        source_var: Var,
        index: TensorIndex,
        position: u32,
    ) -> Self {
        let coordinate_var = Var::int(&format!(
            "{}{induction_name}{name}_{position}",
            source_var.name()
        ));
        let sink_var = Var::int(&format!("{induction_name}{name}_{position}"));
        Self {
            source_var,
            coordinate_var,
            sink_var,
            index,
            offset: Some(position),
        }
    }

    /// The source-position variable the lookup starts from.
    #[must_use]
    pub fn source_var(&self) -> &Var {
        &self.source_var
    }

    /// The coordinate variable.
    #[must_use]
    pub fn coordinate_var(&self) -> &Var {
        &self.coordinate_var
    }

    /// The sink variable.
    #[must_use]
    pub fn sink_var(&self) -> &Var {
        &self.sink_var
    }

    /// The incidence index being traversed.
    #[must_use]
    pub fn tensor_index(&self) -> &TensorIndex {
        &self.index
    }

    /// The endpoint offset. `None` means the lookup ranges over the whole
    /// coordinate range; `Some(k)` addresses the single entry `k` places in.
    #[must_use]
    pub fn offset(&self) -> Option<u32> {
        self.offset
    }

    /// The expression for the coordinate `delta` entries past this lookup's
    /// position: `offsets[source] + offset + delta`.
    #[must_use]
    pub fn load_coordinate(&self, delta: u32) -> Expr {
        let base = Expr::load(
            self.index.coord_array().clone(),
            Expr::var(self.source_var.clone()),
        );
        let shift = self.offset.unwrap_or(0) + delta;
        if shift == 0 {
            base
        } else {
            Expr::add(base, Expr::int(i64::from(shift)))
        }
    }

    /// The exclusive end of the source's coordinate range:
    /// `offsets[source + 1]`.
    #[must_use]
    pub fn load_coordinate_end(&self) -> Expr {
        Expr::load(
            self.index.coord_array().clone(),
            Expr::add(Expr::var(self.source_var.clone()), Expr::int(1)),
        )
    }

    /// The expression resolving the coordinate to its sink element:
    /// `sinks[coord]`.
    #[must_use]
    pub fn load_sink(&self) -> Expr {
        Expr::load(
            self.index.sink_array().clone(),
            Expr::var(self.coordinate_var.clone()),
        )
    }

    /// Statement initializing the coordinate variable.
    #[must_use]
    pub fn init_coordinate_var(&self) -> Stmt {
        Stmt::VarDecl {
            var: self.coordinate_var.clone(),
            init: self.load_coordinate(0),
        }
    }

    /// Statement initializing the sink variable. The coordinate variable
    /// must already be initialized.
    #[must_use]
    pub fn init_sink_var(&self) -> Stmt {
        Stmt::VarDecl {
            var: self.sink_var.clone(),
            init: self.load_sink(),
        }
    }

    /// Statement initializing an externally supplied variable with this
    /// lookup's sink value. Used when sinks of several lookups are merged
    /// into one loop induction variable.
    #[must_use]
    pub fn init_sink_var_as(&self, var: &Var) -> Stmt {
        Stmt::VarDecl {
            var: var.clone(),
            init: self.load_sink(),
        }
    }

    /// The lookup's identity key.
    #[must_use]
    pub fn key(&self) -> (Symbol, Symbol, Option<u32>) {
        (self.index.name(), self.source_var.name(), self.offset)
    }
}

impl fmt::Display for TensorIndexVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) <- {}[{}]",
            self.coordinate_var,
            self.sink_var,
            self.index.name(),
            self.source_var
        )?;
        if let Some(k) = self.offset {
            write!(f, "+{k}")?;
        }
        Ok(())
    }
}

/// One traversal of a shared sparsity structure, computing the terms whose
/// nonzero locations that structure describes.
#[derive(Clone, Debug)]
pub struct SubsetLoop {
    tensor_index_vars: Vec<TensorIndexVar>,
    compute_expr: Expr,
    destination: Expr,
    op: CompoundOperator,
}

impl SubsetLoop {
    /// Create a subset loop. The compound operator defaults to assignment.
    #[must_use]
    pub fn new(
        tensor_index_vars: Vec<TensorIndexVar>,
        compute_expr: Expr,
        destination: Expr,
    ) -> Self {
        Self {
            tensor_index_vars,
            compute_expr,
            destination,
            op: CompoundOperator::Assign,
        }
    }

    /// The lookups driving this traversal. Empty for a dense traversal.
    #[must_use]
    pub fn tensor_index_vars(&self) -> &[TensorIndexVar] {
        &self.tensor_index_vars
    }

    /// The value computed at each visited location.
    #[must_use]
    pub fn compute_expr(&self) -> &Expr {
        &self.compute_expr
    }

    /// The linearized destination index the value is stored at.
    #[must_use]
    pub fn destination(&self) -> &Expr {
        &self.destination
    }

    /// The store semantics at the destination.
    #[must_use]
    pub fn compound_operator(&self) -> CompoundOperator {
        self.op
    }

    /// Override the store semantics.
    pub fn set_compound_operator(&mut self, op: CompoundOperator) {
        self.op = op;
    }
}

impl fmt::Display for SubsetLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subset[")?;
        for (i, tiv) in self.tensor_index_vars.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{tiv}")?;
        }
        write!(f, "] dest[{}] {} {}", self.destination, self.op, self.compute_expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangle_ir::IndexSet;

    fn points_index(name: &str) -> TensorIndex {
        TensorIndex::new(
            Symbol::intern(name),
            IndexSet::set("points"),
            IndexSet::set("points"),
        )
    }

    #[test]
    fn clones_share_identity() {
        let i = IndexVar::free("i", IndexSet::set("points"));
        let outer = IndexVariableLoop::new(i);
        let copy = outer.clone();

        assert!(outer.same_loop(&copy));
        assert_eq!(copy.induction_var().name().as_str(), "i");
    }

    #[test]
    fn linked_chain_has_finite_depth() {
        let i = IndexVar::free("i", IndexSet::set("points"));
        let j = IndexVar::reduction("j", IndexSet::set("points"));
        let outer = IndexVariableLoop::new(i);
        let inner = IndexVariableLoop::linked(j, outer.clone());

        assert!(inner.is_linked());
        assert!(!outer.is_linked());
        assert_eq!(inner.depth(), 2);
        assert!(inner.linked_loop().same_loop(&outer));
        assert_eq!(inner.levels().len(), 2);
    }

    #[test]
    #[should_panic(expected = "undefined index-variable loop")]
    fn undefined_loop_panics_on_access() {
        let undef = IndexVariableLoop::default();
        assert!(!undef.is_defined());
        let _ = undef.index_var();
    }

    #[test]
    #[should_panic(expected = "no linked loop")]
    fn unlinked_loop_panics_on_linked_access() {
        let i = IndexVar::free("i", IndexSet::set("points"));
        let outer = IndexVariableLoop::new(i);
        let _ = outer.linked_loop();
    }

    #[test]
    fn lookup_vars_are_named_from_context() {
        let tiv = TensorIndexVar::new("j", "A", Var::int("i"), points_index("A_row2col"));

        assert_eq!(tiv.coordinate_var().name().as_str(), "ijA");
        assert_eq!(tiv.sink_var().name().as_str(), "jA");
        assert_eq!(tiv.tensor_index().name().as_str(), "A_row2col");
        assert_eq!(
            tiv.key(),
            (
                Symbol::intern("A_row2col"),
                Symbol::intern("i"),
                None
            )
        );
        assert_eq!(
            tiv.load_coordinate(0).to_string(),
            "A_row2col_coords[i]"
        );
        assert_eq!(
            tiv.load_coordinate(1).to_string(),
            "(A_row2col_coords[i] + 1)"
        );
        assert_eq!(
            tiv.load_coordinate_end().to_string(),
            "A_row2col_coords[(i + 1)]"
        );
        assert_eq!(tiv.load_sink().to_string(), "A_row2col_sinks[ijA]");
    }

    #[test]
    fn endpoint_lookup_bakes_in_its_offset() {
        let idx = TensorIndex::new(
            Symbol::intern("springs_ep"),
            IndexSet::set("springs"),
            IndexSet::set("points"),
        );
        let tiv = TensorIndexVar::at_endpoint("j", "F", Var::int("e"), idx, 1);

        assert_eq!(tiv.offset(), Some(1));
        assert_eq!(
            tiv.load_coordinate(0).to_string(),
            "(springs_ep_coords[e] + 1)"
        );
        let init = tiv.init_coordinate_var();
        assert_eq!(init.to_string(), "var ejF_1 = (springs_ep_coords[e] + 1);\n");
    }

    #[test]
    fn sink_can_be_merged_into_external_var() {
        let tiv = TensorIndexVar::new("j", "A", Var::int("i"), points_index("A_row2col"));
        let j = Var::int("j");

        let init = tiv.init_sink_var_as(&j);
        assert_eq!(init.to_string(), "var j = A_row2col_sinks[ijA];\n");
    }

    #[test]
    fn subset_loop_defaults_to_assignment() {
        let mut sl = SubsetLoop::new(Vec::new(), Expr::float(1.0), Expr::int(0));
        assert_eq!(sl.compound_operator(), CompoundOperator::Assign);
        sl.set_compound_operator(CompoundOperator::Add);
        assert_eq!(sl.compound_operator(), CompoundOperator::Add);
    }
}
