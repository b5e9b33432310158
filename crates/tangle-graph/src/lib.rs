//! # Tangle runtime graphs
//!
//! The in-memory representation of the data Tangle programs run over:
//! element [`Set`]s with typed per-element fields, [`EdgeSet`]s whose
//! elements connect a fixed number of endpoints, and the derivation of the
//! compressed incidence structures ([`CsrIndex`]) that back the compiler's
//! sparse tensor indices at run time.
//!
//! ```text
//! Set/EdgeSet (user data) → CsrIndex (offsets + sinks) → bound buffers
//! ```

#![warn(missing_docs)]

pub mod csr;
pub mod error;
pub mod set;

pub use csr::{diagonal_index, endpoint_index, neighbor_index, CsrIndex};
pub use error::GraphError;
pub use set::{EdgeSet, ElementRef, Set};
