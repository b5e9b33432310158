//! Runtime graph errors.

use thiserror::Error;

/// An error building or consuming runtime graph data.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A field name was not declared on the set.
    #[error("set `{set}` has no field `{field}`")]
    UnknownField {
        /// The set's name.
        set: String,
        /// The missing field.
        field: String,
    },

    /// A field was accessed with the wrong component type.
    #[error("field `{field}` holds {actual} components, not {requested}")]
    FieldTypeMismatch {
        /// The field's name.
        field: String,
        /// The stored component type.
        actual: &'static str,
        /// The requested component type.
        requested: &'static str,
    },

    /// An element handle does not belong to the set.
    #[error("element {element} is out of bounds for set `{set}` of {len} elements")]
    InvalidElement {
        /// The set's name.
        set: String,
        /// The offending handle.
        element: u32,
        /// The set's length.
        len: usize,
    },

    /// An edge was created with the wrong number of endpoints.
    #[error("edge set `{set}` takes {expected} endpoints, got {got}")]
    ArityMismatch {
        /// The edge set's name.
        set: String,
        /// The declared endpoint count.
        expected: usize,
        /// The supplied endpoint count.
        got: usize,
    },

    /// A compressed incidence index violates its structural invariants.
    #[error("malformed incidence index: {reason}")]
    MalformedIndex {
        /// The violated invariant.
        reason: String,
    },
}
