//! Lowering errors.

use tangle_diagnostics::{Diagnostic, Span};
use thiserror::Error;

/// An error raised while lowering an index expression to loops.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LowerError {
    /// The expression uses a sparsity pattern the lowering cannot traverse.
    ///
    /// Raised for sparse reads with no registered incidence index, for
    /// index variables with no access path from the enclosing loop nest,
    /// and for traversal shapes (such as intersecting two different sparse
    /// structures in one term) that have no loop rendition here.
    #[error("cannot lower index expression `{expr}`: {reason}")]
    Unsupported {
        /// The offending expression, printed.
        expr: String,
        /// What made it unlowerable.
        reason: String,
    },

    /// An internal invariant of the lowering was violated.
    #[error("internal lowering error on `{expr}`: {reason}")]
    Internal {
        /// The expression being lowered, printed.
        expr: String,
        /// The violated invariant.
        reason: String,
    },
}

impl LowerError {
    /// Render as a diagnostic at `span`.
    #[must_use]
    pub fn into_diagnostic(self, span: Span) -> Diagnostic {
        match self {
            Self::Unsupported { .. } => Diagnostic::error(self.to_string()).with_span(span),
            Self::Internal { .. } => Diagnostic::bug(self.to_string()).with_span(span),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_follows_error_class() {
        let unsupported = LowerError::Unsupported {
            expr: "A(i,j)".to_string(),
            reason: "no sparse incidence index is registered for this tensor".to_string(),
        };
        let diag = unsupported.into_diagnostic(Span::new(3, 9));
        assert!(diag.is_error());
        assert!(diag.to_string().starts_with("error:"));
        assert!(diag.to_string().contains("A(i,j)"));

        let internal = LowerError::Internal {
            expr: "(i,j) A(i,j)".to_string(),
            reason: "merged sink variables have mismatched domains".to_string(),
        };
        let diag = internal.into_diagnostic(Span::DUMMY);
        assert!(diag.to_string().starts_with("internal compiler error:"));
    }
}
