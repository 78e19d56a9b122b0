//! Diagnostic records for capture-clause checking.

use crate::span::{Label, Span};
use serde::{Deserialize, Serialize};

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational hint; never fails a run
    Hint,
    /// Warning; fails a run only in strict mode
    Warning,
    /// Error; the closure cannot be desugared as written
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Hint => "hint",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable diagnostic kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // Syntax (P001-P099)
    /// Malformed fragment or clause text
    SyntaxError,

    // Capture resolution (C001-C099)
    /// Same binding name declared twice in one clause
    DuplicateCaptureEntry,
    /// Free variable with no matching entry and no applicable wildcard
    UnauthorizedCapture,
    /// Two entries match one path at the same precedence level
    AmbiguousCapture,
    /// Field wildcard or field path that the type metadata cannot back
    UnknownField,
    /// `self.*` used without an aggregate receiver in scope
    IllegalSelfWildcardOutsideAggregateContext,
    /// Body mutates a path that was captured by reference
    MutationThroughReferenceCapture,
    /// Bound expression that only borrows an outer place
    BorrowedBoundExpression,

    // Lints (W001-W099)
    /// Explicit entry that the body never uses
    UnusedCaptureEntry,

    // Internal errors (I001-I099)
    InternalError,
}

impl DiagnosticCode {
    pub const ALL: &'static [DiagnosticCode] = &[
        Self::SyntaxError,
        Self::DuplicateCaptureEntry,
        Self::UnauthorizedCapture,
        Self::AmbiguousCapture,
        Self::UnknownField,
        Self::IllegalSelfWildcardOutsideAggregateContext,
        Self::MutationThroughReferenceCapture,
        Self::BorrowedBoundExpression,
        Self::UnusedCaptureEntry,
        Self::InternalError,
    ];

    /// The code string, e.g. "C002".
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyntaxError => "P001",

            Self::DuplicateCaptureEntry => "C001",
            Self::UnauthorizedCapture => "C002",
            Self::AmbiguousCapture => "C003",
            Self::UnknownField => "C004",
            Self::IllegalSelfWildcardOutsideAggregateContext => "C005",
            Self::MutationThroughReferenceCapture => "C006",
            Self::BorrowedBoundExpression => "C007",

            Self::UnusedCaptureEntry => "W001",

            Self::InternalError => "I001",
        }
    }

    /// The kind name, e.g. "UnauthorizedCapture".
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::SyntaxError => "SyntaxError",
            Self::DuplicateCaptureEntry => "DuplicateCaptureEntry",
            Self::UnauthorizedCapture => "UnauthorizedCapture",
            Self::AmbiguousCapture => "AmbiguousCapture",
            Self::UnknownField => "UnknownField",
            Self::IllegalSelfWildcardOutsideAggregateContext => {
                "IllegalSelfWildcardOutsideAggregateContext"
            }
            Self::MutationThroughReferenceCapture => "MutationThroughReferenceCapture",
            Self::BorrowedBoundExpression => "BorrowedBoundExpression",
            Self::UnusedCaptureEntry => "UnusedCaptureEntry",
            Self::InternalError => "InternalError",
        }
    }

    /// Look a code up by its code string, case-insensitively.
    pub fn from_code_str(code: &str) -> Option<DiagnosticCode> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(code))
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            Self::SyntaxError
            | Self::DuplicateCaptureEntry
            | Self::UnauthorizedCapture
            | Self::AmbiguousCapture
            | Self::UnknownField
            | Self::IllegalSelfWildcardOutsideAggregateContext
            | Self::MutationThroughReferenceCapture
            | Self::BorrowedBoundExpression
            | Self::InternalError => Severity::Error,

            Self::UnusedCaptureEntry => Severity::Hint,
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One reported problem: kind, location, message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// Short message (single line)
    pub message: String,
    /// Longer help text
    pub explanation: Option<String>,
    /// Primary span
    pub span: Span,
    /// Secondary locations
    pub labels: Vec<Label>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code, Severity::Error, message)
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code, Severity::Warning, message)
    }

    pub fn hint(code: DiagnosticCode, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code, Severity::Hint, message)
    }

    /// Create a diagnostic with the code's default severity.
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code, code.default_severity(), message)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    pub fn is_hint(&self) -> bool {
        self.severity == Severity::Hint
    }
}

/// Fluent construction of a [`Diagnostic`].
pub struct DiagnosticBuilder {
    inner: Diagnostic,
}

impl DiagnosticBuilder {
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            inner: Diagnostic {
                code,
                severity,
                message: message.into(),
                explanation: None,
                span: Span::DUMMY,
                labels: Vec::new(),
            },
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.inner.span = span;
        self
    }

    /// Add a secondary label.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.inner.labels.push(Label::secondary(span, message));
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.inner.explanation = Some(help.into());
        self
    }

    pub fn build(self) -> Diagnostic {
        self.inner
    }
}

/// Ordered collection of diagnostics for one closure, fragment or run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(diagnostics);
    }

    /// Order by source location. The sort is stable, so diagnostics at the same
    /// location keep the order they were reported in.
    pub fn sort_by_location(&mut self) {
        self.items.sort_by_key(|d| d.span);
    }

    /// Consume and return the diagnostics in location order.
    pub fn into_sorted(mut self) -> Self {
        self.sort_by_location();
        self
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_warning()).count()
    }

    pub fn hint_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_hint()).count()
    }

    /// Diagnostics carrying `code`.
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.code == code)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<T: IntoIterator<Item = Diagnostic>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
