//! Compressed incidence structures.
//!
//! A [`CsrIndex`] is the runtime backing of the compiler's sparse tensor
//! indices: an offsets array of length `|source| + 1` and a sink array of
//! length `offsets[last]`. For source `s` the sinks are
//! `sinks[offsets[s] .. offsets[s+1])`.
//!
//! The derivation functions build the three structures Tangle programs
//! need from an edge set: edge→endpoints, vertex→neighbor and
//! vertex→self (diagonal).

use serde::{Deserialize, Serialize};

use crate::{EdgeSet, GraphError};

/// A compressed source→sinks incidence structure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrIndex {
    offsets: Vec<i64>,
    sinks: Vec<i64>,
}

impl CsrIndex {
    /// Build from per-source sink lists.
    #[must_use]
    pub fn from_rows(rows: &[Vec<i64>]) -> Self {
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        let mut sinks = Vec::new();
        offsets.push(0);
        for row in rows {
            sinks.extend_from_slice(row);
            offsets.push(sinks.len() as i64);
        }
        Self { offsets, sinks }
    }

    /// The offsets array (`|source| + 1` entries, nondecreasing).
    #[must_use]
    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    /// The sink array (`offsets[last]` entries).
    #[must_use]
    pub fn sinks(&self) -> &[i64] {
        &self.sinks
    }

    /// Number of source elements.
    #[must_use]
    pub fn source_len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// The sinks of one source element.
    #[must_use]
    pub fn neighbors(&self, source: usize) -> &[i64] {
        let lo = self.offsets[source] as usize;
        let hi = self.offsets[source + 1] as usize;
        &self.sinks[lo..hi]
    }

    /// Check the structural invariants: a nonempty nondecreasing offsets
    /// array starting at zero, and a sink array of exactly `offsets[last]`
    /// entries.
    pub fn validate(&self) -> Result<(), GraphError> {
        let malformed = |reason: String| GraphError::MalformedIndex { reason };
        let Some(&first) = self.offsets.first() else {
            return Err(malformed("offsets array is empty".to_string()));
        };
        if first != 0 {
            return Err(malformed(format!("offsets start at {first}, not 0")));
        }
        for pair in self.offsets.windows(2) {
            if pair[1] < pair[0] {
                return Err(malformed(format!(
                    "offsets decrease from {} to {}",
                    pair[0], pair[1]
                )));
            }
        }
        let expected = self.offsets[self.offsets.len() - 1] as usize;
        if self.sinks.len() != expected {
            return Err(malformed(format!(
                "sink array has {} entries, offsets imply {expected}",
                self.sinks.len()
            )));
        }
        Ok(())
    }
}

/// The edge→endpoints structure: every edge's sinks are its endpoints in
/// declaration order, so `offsets[e] = e * arity`.
#[must_use]
pub fn endpoint_index(edges: &EdgeSet) -> CsrIndex {
    let rows: Vec<Vec<i64>> = edges
        .set()
        .elements()
        .map(|e| {
            edges
                .endpoints(e)
                .map(|eps| eps.iter().map(|&p| i64::from(p)).collect())
                .unwrap_or_default()
        })
        .collect();
    CsrIndex::from_rows(&rows)
}

/// The vertex→neighbor structure over `vertex_count` vertices: for each
/// vertex, the sorted distinct other endpoints of its incident edges. The
/// vertex itself is not included; the diagonal is a separate structure.
///
/// An endpoint id at or beyond `vertex_count` is an error: the derived
/// structure would point outside its source dimension.
pub fn neighbor_index(edges: &EdgeSet, vertex_count: usize) -> Result<CsrIndex, GraphError> {
    let mut rows: Vec<Vec<i64>> = vec![Vec::new(); vertex_count];
    for edge in edges.set().elements() {
        let endpoints = edges.endpoints(edge)?;
        for &a in endpoints {
            let Some(row) = rows.get_mut(a as usize) else {
                return Err(GraphError::MalformedIndex {
                    reason: format!(
                        "endpoint {a} of edge set `{}` is out of range for {vertex_count} vertices",
                        edges.set().name()
                    ),
                });
            };
            for &b in endpoints {
                if a != b {
                    row.push(i64::from(b));
                }
            }
        }
    }
    for row in &mut rows {
        row.sort_unstable();
        row.dedup();
    }
    Ok(CsrIndex::from_rows(&rows))
}

/// The vertex→self structure: each vertex's single sink is itself.
#[must_use]
pub fn diagonal_index(vertex_count: usize) -> CsrIndex {
    let rows: Vec<Vec<i64>> = (0..vertex_count).map(|v| vec![v as i64]).collect();
    CsrIndex::from_rows(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Set;

    fn two_springs() -> EdgeSet {
        let mut points = Set::new("points");
        let p0 = points.add_element();
        let p1 = points.add_element();
        let p2 = points.add_element();
        let mut springs = EdgeSet::new("springs", 2);
        springs.add_edge(&[p0, p1]).unwrap();
        springs.add_edge(&[p1, p2]).unwrap();
        springs
    }

    #[test]
    fn endpoint_structure_is_dense_per_edge() {
        let idx = endpoint_index(&two_springs());
        assert_eq!(idx.offsets(), &[0, 2, 4]);
        assert_eq!(idx.sinks(), &[0, 1, 1, 2]);
        idx.validate().unwrap();
    }

    #[test]
    fn neighbor_structure_excludes_self_and_sorts() {
        let idx = neighbor_index(&two_springs(), 3).unwrap();
        assert_eq!(idx.offsets(), &[0, 1, 3, 4]);
        assert_eq!(idx.neighbors(0), &[1]);
        assert_eq!(idx.neighbors(1), &[0, 2]);
        assert_eq!(idx.neighbors(2), &[1]);
        idx.validate().unwrap();
    }

    #[test]
    fn neighbor_structure_rejects_out_of_range_endpoints() {
        // two_springs references vertex 2; only two vertices declared.
        assert!(matches!(
            neighbor_index(&two_springs(), 2),
            Err(GraphError::MalformedIndex { .. })
        ));
    }

    #[test]
    fn diagonal_structure_maps_each_vertex_to_itself() {
        let idx = diagonal_index(3);
        assert_eq!(idx.offsets(), &[0, 1, 2, 3]);
        assert_eq!(idx.sinks(), &[0, 1, 2]);
    }

    #[test]
    fn validate_rejects_malformed_structures() {
        let bad = CsrIndex {
            offsets: vec![0, 2, 1],
            sinks: vec![0],
        };
        assert!(matches!(
            bad.validate(),
            Err(GraphError::MalformedIndex { .. })
        ));

        let short = CsrIndex {
            offsets: vec![0, 2],
            sinks: vec![0],
        };
        assert!(short.validate().is_err());

        let empty = CsrIndex::from_rows(&[]);
        assert_eq!(empty.offsets(), &[0]);
        empty.validate().unwrap();
    }
}
