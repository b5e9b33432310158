//! Diagnostic reporting for the Tangle compiler.
//!
//! Lowering distinguishes two failure classes: internal invariant violations
//! (malformed IR delivered by an earlier phase; a compiler bug) and
//! unsupported constructs (legally typed programs the backend cannot lower
//! yet). Both are reported through [`Diagnostic`]s collected by a
//! [`DiagnosticHandler`], so that a failing function aborts its own
//! compilation without taking down the rest of a batch.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open byte range `[lo, hi)` into a source file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Start of the span (inclusive).
    pub lo: u32,
    /// End of the span (exclusive).
    pub hi: u32,
}

impl Span {
    /// A span for generated code with no source location.
    pub const DUMMY: Self = Self { lo: 0, hi: 0 };

    /// Create a new span.
    #[must_use]
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    /// Check whether this is the dummy span.
    #[must_use]
    pub const fn is_dummy(self) -> bool {
        self.lo == 0 && self.hi == 0
    }

    /// Merge two spans into one covering both.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        if self.is_dummy() {
            return other;
        }
        if other.is_dummy() {
            return self;
        }
        Self {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }
}

/// The severity of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// A bug in the compiler itself (internal invariant violation).
    Bug,
    /// An error that stops compilation of the current function.
    Error,
    /// A warning; compilation continues.
    Warning,
    /// Additional context attached to another diagnostic.
    Note,
}

impl Severity {
    /// The human-readable label for this severity.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Bug => "internal compiler error",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Note => "note",
        }
    }
}

/// A diagnostic message, optionally anchored to a source span.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Severity of this diagnostic.
    pub severity: Severity,
    /// The main message.
    pub message: String,
    /// The source span the message refers to, if known.
    pub span: Span,
    /// Additional notes, e.g. the formatted offending expression.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span: Span::DUMMY,
            notes: Vec::new(),
        }
    }

    /// Create a bug diagnostic (internal compiler error).
    #[must_use]
    pub fn bug(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Bug,
            message: message.into(),
            span: Span::DUMMY,
            notes: Vec::new(),
        }
    }

    /// Create a warning diagnostic.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span: Span::DUMMY,
            notes: Vec::new(),
        }
    }

    /// Anchor the diagnostic to a source span.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Attach a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Check whether this diagnostic stops compilation.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error | Severity::Bug)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity.label(), self.message)?;
        if !self.span.is_dummy() {
            write!(f, " (at bytes {}..{})", self.span.lo, self.span.hi)?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

/// Collects diagnostics emitted during compilation of one batch.
#[derive(Debug, Default)]
pub struct DiagnosticHandler {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl DiagnosticHandler {
    /// Create an empty handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a diagnostic.
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            self.error_count += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Check whether any error has been emitted.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// The number of errors emitted so far.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// All diagnostics emitted so far.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Take all diagnostics, resetting the handler.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.error_count = 0;
        std::mem::take(&mut self.diagnostics)
    }
}
