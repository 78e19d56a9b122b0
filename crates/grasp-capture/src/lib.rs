//! Capture analysis for grasp
//!
//! For one closure this crate:
//! 1. Collects the outer paths its body uses ([`collect_free_vars`])
//! 2. Checks them against the capture clause, if any ([`resolve_captures`])
//! 3. Produces the [`CaptureTable`] the desugarer consumes
//!
//! Every step reads only its inputs and the shared [`FieldProvider`], so
//! closures can be analyzed in parallel.

pub mod free_vars;
pub mod resolve;
pub mod table;

pub use free_vars::{collect_free_vars, place_path, FreeVar, FreeVarSet};
pub use resolve::{resolve_captures, resolve_explicit, resolve_legacy, Resolved};
pub use table::{CaptureTable, EntryOrigin, Resolution, Strategy, TableEntry};

use grasp_diagnostics::Diagnostics;
use grasp_parser::{ClauseState, Closure};
use grasp_types::{FieldProvider, HostContext};

/// Everything known about one closure's captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub free_vars: FreeVarSet,
    /// `None` when the clause could not be parsed
    pub table: Option<CaptureTable>,
    pub diagnostics: Diagnostics,
}

impl Analysis {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Run free-variable collection and resolution for `closure`.
pub fn analyze_closure(
    closure: &Closure,
    ctx: &HostContext,
    provider: &dyn FieldProvider,
) -> Analysis {
    let free_vars = collect_free_vars(closure, ctx);

    match &closure.clause {
        ClauseState::Invalid { span, errors, .. } => {
            let diagnostics: Diagnostics = errors.iter().map(|e| e.to_diagnostic(*span)).collect();
            Analysis {
                free_vars,
                table: None,
                diagnostics: diagnostics.into_sorted(),
            }
        }
        ClauseState::Absent => Analysis {
            table: Some(resolve_legacy(closure.is_move, &free_vars)),
            free_vars,
            diagnostics: Diagnostics::new(),
        },
        ClauseState::Parsed(clause) => {
            let resolved = resolve_explicit(clause, &free_vars, ctx, provider);
            Analysis {
                free_vars,
                table: Some(resolved.table),
                diagnostics: resolved.diagnostics,
            }
        }
    }
}
