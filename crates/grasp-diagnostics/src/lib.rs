//! Diagnostic infrastructure for grasp.
//!
//! Capture-clause problems are reported as data, never thrown. This crate
//! provides:
//! - Source location tracking (file, line, column)
//! - Diagnostic records with stable codes and severities
//! - Location-ordered collections
//! - Multiple output formats (terminal, JSON, simple text)
//!
//! # Example
//!
//! ```
//! use grasp_diagnostics::{
//!     Diagnostic, DiagnosticCode, DiagnosticEmitter, SimpleEmitter, SourceCache, Span,
//! };
//!
//! let mut cache = SourceCache::new();
//! let file_id = cache.add_file("demo.grasp", "[my_vec] || other_var".to_string());
//!
//! let diag = Diagnostic::new(
//!     DiagnosticCode::UnauthorizedCapture,
//!     "`other_var` is not authorized by the capture clause",
//! )
//! .with_span(Span::new(file_id, 12, 21))
//! .with_help("add `other_var` to the clause")
//! .build();
//!
//! let mut out = Vec::new();
//! SimpleEmitter::new(&mut out).emit(&diag, &cache).unwrap();
//! assert!(String::from_utf8(out).unwrap().contains("[C002]"));
//! ```

pub mod diagnostic;
pub mod emitter;
pub mod source_cache;
pub mod span;

pub use diagnostic::{Diagnostic, DiagnosticBuilder, DiagnosticCode, Diagnostics, Severity};
pub use emitter::{DiagnosticEmitter, JsonEmitter, SimpleEmitter, TerminalEmitter};
pub use source_cache::{SourceCache, SourceFile};
pub use span::{FileId, Label, LabelStyle, Location, Span};
