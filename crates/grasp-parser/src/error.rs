use grasp_diagnostics::{Diagnostic, DiagnosticCode, Span};
use thiserror::Error;

/// A fragment that cannot be parsed at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(DiagnosticCode::SyntaxError, self.message.clone())
            .with_span(self.span)
            .build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseErrorKind {
    /// Malformed entry or conflicting wildcards
    Syntax,
    /// Same name declared twice
    DuplicateEntry,
}

/// A problem inside one capture clause. The closure it belongs to is left
/// untransformed; the rest of the fragment is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClauseError {
    pub kind: ClauseErrorKind,
    pub message: String,
    pub span: Span,
    pub help: Option<String>,
    /// Earlier entry this one conflicts with
    pub related: Option<Span>,
}

impl ClauseError {
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: ClauseErrorKind::Syntax,
            message: message.into(),
            span,
            help: None,
            related: None,
        }
    }

    pub fn duplicate(name: &str, span: Span, first: Span) -> Self {
        Self {
            kind: ClauseErrorKind::DuplicateEntry,
            message: format!("`{}` is captured more than once", name),
            span,
            help: Some("remove one of the entries".to_string()),
            related: Some(first),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn code(&self) -> DiagnosticCode {
        match self.kind {
            ClauseErrorKind::Syntax => DiagnosticCode::SyntaxError,
            ClauseErrorKind::DuplicateEntry => DiagnosticCode::DuplicateCaptureEntry,
        }
    }

    pub fn to_diagnostic(&self, clause_span: Span) -> Diagnostic {
        let mut builder = Diagnostic::new(self.code(), self.message.clone())
            .with_span(self.span)
            .with_label(clause_span, "in this capture clause");
        if let Some(first) = self.related {
            builder = builder.with_label(first, "first captured here");
        }
        if let Some(help) = &self.help {
            builder = builder.with_help(help.clone());
        }
        builder.build()
    }
}

impl From<SyntaxError> for ClauseError {
    fn from(err: SyntaxError) -> Self {
        ClauseError::syntax(err.message, err.span)
    }
}
