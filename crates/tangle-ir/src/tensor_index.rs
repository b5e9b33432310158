//! Sparse incidence indices.
//!
//! A [`TensorIndex`] is a compressed mapping from a source element to the
//! ordered set of sink elements it is related to: an offsets array of length
//! `|source| + 1` and a sink-coordinate array of length `offsets[last]`.
//! For source `s` the sinks are `sinks[offsets[s] .. offsets[s+1])`.
//!
//! The index is symbolic at compile time; only the names of its two storage
//! arrays appear in generated code. The arrays themselves are bound at
//! runtime (see `tangle-graph` for their derivation from edge sets).

use crate::{IndexSet, ScalarType, Type, Var};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use tangle_intern::Symbol;

/// A compressed sparse incidence index.
///
/// Identity is the index's name: two `TensorIndex` values with the same name
/// denote the same index, and the environment registers at most one per
/// name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TensorIndex {
    name: Symbol,
    source_dim: IndexSet,
    sink_dim: IndexSet,
    coord_array: Var,
    sink_array: Var,
}

impl TensorIndex {
    /// Create an index mapping `source_dim` elements to `sink_dim` elements.
    ///
    /// The two storage arrays are named `<name>_coords` (the offsets array)
    /// and `<name>_sinks` (the sink-coordinate array).
    #[must_use]
    pub fn new(name: Symbol, source_dim: IndexSet, sink_dim: IndexSet) -> Self {
        let coord_array = Var::new(
            Symbol::intern(&format!("{name}_coords")),
            Type::tensor(ScalarType::Int, [source_dim.clone()]),
        );
        let sink_array = Var::new(
            Symbol::intern(&format!("{name}_sinks")),
            Type::tensor(ScalarType::Int, [sink_dim.clone()]),
        );
        Self {
            name,
            source_dim,
            sink_dim,
            coord_array,
            sink_array,
        }
    }

    /// The index's name (its identity).
    #[must_use]
    pub fn name(&self) -> Symbol {
        self.name
    }

    /// The domain of source elements.
    #[must_use]
    pub fn source_dimension(&self) -> &IndexSet {
        &self.source_dim
    }

    /// The domain of sink elements.
    #[must_use]
    pub fn sink_dimension(&self) -> &IndexSet {
        &self.sink_dim
    }

    /// The offsets array variable (`|source| + 1` entries, nondecreasing).
    #[must_use]
    pub fn coord_array(&self) -> &Var {
        &self.coord_array
    }

    /// The sink-coordinate array variable (`offsets[last]` entries).
    #[must_use]
    pub fn sink_array(&self) -> &Var {
        &self.sink_array
    }
}

impl PartialEq for TensorIndex {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TensorIndex {}

impl Hash for TensorIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for TensorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.name, self.source_dim, self.sink_dim
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_names_derive_from_index_name() {
        let idx = TensorIndex::new(
            Symbol::intern("A_row2col"),
            IndexSet::set("points"),
            IndexSet::set("points"),
        );
        assert_eq!(idx.coord_array().name().as_str(), "A_row2col_coords");
        assert_eq!(idx.sink_array().name().as_str(), "A_row2col_sinks");
    }

    #[test]
    fn identity_is_by_name() {
        let a = TensorIndex::new(
            Symbol::intern("nbrs"),
            IndexSet::set("points"),
            IndexSet::set("points"),
        );
        let b = TensorIndex::new(
            Symbol::intern("nbrs"),
            IndexSet::set("points"),
            IndexSet::set("points"),
        );
        assert_eq!(a, b);
    }
}
