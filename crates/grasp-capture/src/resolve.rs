//! Capture resolution.
//!
//! Two independent strategies, chosen by whether a clause was written:
//!
//! - **Legacy** (no clause): every free variable is captured by reference,
//!   or by move for a `move` closure. Nothing is checked.
//! - **Explicit** (any clause, `[]` included): each free variable must match,
//!   in order, an explicit entry for the exact path, a single explicit entry
//!   for a strict prefix of it, or the clause wildcard. Anything else is
//!   reported.
//!
//! Field wildcards (`+root.*`) are expanded through the [`FieldProvider`]
//! before matching, into one `Clone` entry per declared field.
//!
//! A bound expression must evaluate to a value the closure owns, so
//! `name = &x` and `name = &mut x` over an outer place are rejected.

use crate::free_vars::{place_path, FreeVar, FreeVarSet};
use crate::table::{CaptureTable, EntryOrigin, Resolution, Strategy, TableEntry};
use grasp_diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use grasp_parser::{CaptureClause, CaptureEntry, CaptureMode, CapturePath, ExprKind, UnaryOp};
use grasp_types::{FieldInfo, FieldProvider, HostContext, Type};

/// A capture table together with the problems found while building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub table: CaptureTable,
    pub diagnostics: Diagnostics,
}

/// Resolve with the strategy selected by clause presence.
pub fn resolve_captures(
    clause: Option<&CaptureClause>,
    is_move: bool,
    free: &FreeVarSet,
    ctx: &HostContext,
    provider: &dyn FieldProvider,
) -> Resolved {
    match clause {
        Some(clause) => resolve_explicit(clause, free, ctx, provider),
        None => Resolved {
            table: resolve_legacy(is_move, free),
            diagnostics: Diagnostics::new(),
        },
    }
}

/// All-by-reference (or all-by-move) capture of the coarsest used paths.
pub fn resolve_legacy(is_move: bool, free: &FreeVarSet) -> CaptureTable {
    let mode = if is_move {
        CaptureMode::Move
    } else {
        CaptureMode::Reference
    };
    let vars: Vec<&FreeVar> = free.iter().collect();
    let entries: Vec<TableEntry> = coarsest(&vars)
        .into_iter()
        .map(|var| TableEntry {
            name: var.path.to_string(),
            path: var.path.clone(),
            mode,
            origin: EntryOrigin::Legacy,
            value: None,
            span: var.span,
        })
        .collect();
    let resolutions = covering_resolutions(&vars, &entries, 0);
    log::debug!(
        "legacy capture of {} paths ({})",
        entries.len(),
        mode.as_str()
    );
    CaptureTable::new(Strategy::Legacy { is_move }, entries, resolutions)
}

/// Authorize every free variable against `clause`.
pub fn resolve_explicit(
    clause: &CaptureClause,
    free: &FreeVarSet,
    ctx: &HostContext,
    provider: &dyn FieldProvider,
) -> Resolved {
    let mut diagnostics = Diagnostics::new();
    let mut entries: Vec<TableEntry> = Vec::new();
    let mut wildcard_roots: Vec<(CapturePath, &CaptureEntry)> = Vec::new();
    let mut failed_roots: Vec<CapturePath> = Vec::new();

    for (index, entry) in clause.entries.iter().enumerate() {
        if entry.mode != CaptureMode::FieldWildcardClone {
            if let Some(diag) = check_field_path(entry, ctx, provider) {
                diagnostics.push(diag);
            }
            if let Some(diag) = check_bound_value(entry, &clause.entries[..index]) {
                diagnostics.push(diag);
            }
            entries.push(TableEntry {
                name: entry.name.clone(),
                path: entry.path.clone(),
                mode: entry.mode,
                origin: EntryOrigin::Explicit { index },
                value: entry.value.clone(),
                span: entry.span,
            });
            continue;
        }

        let fields = match expand_field_wildcard(entry, ctx, provider) {
            Ok(fields) => fields,
            Err(diag) => {
                diagnostics.push(diag);
                failed_roots.push(entry.path.clone());
                continue;
            }
        };
        log::trace!("`{}` expands to {} fields", entry.name, fields.len());
        wildcard_roots.push((entry.path.clone(), entry));

        for field in fields {
            let path = entry.path.child(field.name);
            let explicit = clause
                .entries
                .iter()
                .find(|e| e.mode != CaptureMode::FieldWildcardClone && e.path == path);
            if let Some(explicit) = explicit {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::AmbiguousCapture,
                        format!(
                            "`{}` is captured by both `+{}` and this entry",
                            path, entry.name
                        ),
                    )
                    .with_span(explicit.span)
                    .with_label(entry.span, format!("field wildcard also captures `{}`", path))
                    .with_help("remove the explicit entry or the field wildcard")
                    .build(),
                );
                continue;
            }
            entries.push(TableEntry {
                name: path.to_string(),
                path,
                mode: CaptureMode::Clone,
                origin: EntryOrigin::FieldWildcard { index },
                value: None,
                span: entry.span,
            });
        }
    }

    let mut resolutions = Vec::new();
    let mut pending: Vec<&FreeVar> = Vec::new();

    for var in free {
        // (1) exact explicit entry
        if let Some(idx) = entries.iter().position(|e| e.path == var.path) {
            resolutions.push(Resolution {
                path: var.path.clone(),
                entry: idx,
            });
            continue;
        }

        // (2) explicit entry for a strict prefix
        let prefixes: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.path.is_strict_prefix_of(&var.path))
            .map(|(idx, _)| idx)
            .collect();
        match prefixes.as_slice() {
            [idx] => {
                resolutions.push(Resolution {
                    path: var.path.clone(),
                    entry: *idx,
                });
                continue;
            }
            [_, _, ..] => {
                let mut builder = Diagnostic::new(
                    DiagnosticCode::AmbiguousCapture,
                    format!("`{}` is covered by more than one capture entry", var.path),
                )
                .with_span(var.span);
                for idx in &prefixes {
                    let other = &entries[*idx];
                    builder = builder.with_label(other.span, format!("`{}` matches here", other.name));
                }
                diagnostics.push(
                    builder
                        .with_help("remove one of the overlapping entries")
                        .build(),
                );
                continue;
            }
            [] => {}
        }

        if let Some((root, entry)) = wildcard_roots
            .iter()
            .find(|(root, _)| root.is_strict_prefix_of(&var.path))
        {
            let field = &var.path.fields[root.fields.len()];
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::UnknownField,
                    format!("`{}` has no field `{}`", root, field),
                )
                .with_span(var.span)
                .with_label(entry.span, format!("`{}` captures only the declared fields", entry.name))
                .build(),
            );
            continue;
        }
        if failed_roots.iter().any(|root| root.is_strict_prefix_of(&var.path)) {
            // The field wildcard itself was already reported.
            continue;
        }

        // (3) wildcard default; never for the receiver
        if clause.wildcard.capture_mode().is_some() && !var.path.is_self_rooted() {
            pending.push(var);
            continue;
        }

        // (4) nothing matches
        diagnostics.push(unauthorized(var, clause));
    }

    if let Some(mode) = clause.wildcard.capture_mode() {
        let base = entries.len();
        for var in coarsest(&pending) {
            entries.push(TableEntry {
                name: var.path.to_string(),
                path: var.path.clone(),
                mode,
                origin: EntryOrigin::Wildcard,
                value: None,
                span: var.span,
            });
        }
        resolutions.extend(covering_resolutions(&pending, &entries[base..], base));
    }

    for var in free {
        if !var.mutated {
            continue;
        }
        let Some(res) = resolutions.iter().find(|r| r.path == var.path) else {
            continue;
        };
        let entry = &entries[res.entry];
        if entry.mode == CaptureMode::Reference {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::MutationThroughReferenceCapture,
                    format!("cannot mutate `{}`: it is captured by reference", var.path),
                )
                .with_span(var.span)
                .with_label(entry.span, format!("`{}` is captured by reference here", entry.name))
                .with_help(format!(
                    "capture it by value with `{}` or `+{}`",
                    entry.path, entry.path
                ))
                .build(),
            );
        }
    }

    for (idx, entry) in entries.iter().enumerate() {
        if entry.is_explicit() && !resolutions.iter().any(|r| r.entry == idx) {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::UnusedCaptureEntry,
                    format!("capture `{}` is never used", entry.name),
                )
                .with_span(entry.span)
                .with_help("remove it from the capture clause")
                .build(),
            );
        }
    }

    log::debug!(
        "resolved {} free variables into {} capture entries ({} diagnostics)",
        free.len(),
        entries.len(),
        diagnostics.len()
    );

    Resolved {
        table: CaptureTable::new(Strategy::Explicit, entries, resolutions),
        diagnostics: diagnostics.into_sorted(),
    }
}

fn unauthorized(var: &FreeVar, clause: &CaptureClause) -> Diagnostic {
    let help = if var.path.is_self_rooted() {
        "add `self`, `&self.field` or `+self.*` to the clause; wildcards never capture `self`"
            .to_string()
    } else {
        format!(
            "add `&{0}`, `{0}` or `+{0}` to the capture clause",
            var.path
        )
    };
    Diagnostic::new(
        DiagnosticCode::UnauthorizedCapture,
        format!("`{}` is not authorized by the capture clause", var.path),
    )
    .with_span(var.span)
    .with_label(clause.span, "capture clause declared here")
    .with_help(help)
    .build()
}

/// Free variables not covered by a shorter free variable in the same set.
fn coarsest<'a>(vars: &[&'a FreeVar]) -> Vec<&'a FreeVar> {
    vars.iter()
        .filter(|var| {
            !vars
                .iter()
                .any(|other| other.path.is_strict_prefix_of(&var.path))
        })
        .copied()
        .collect()
}

/// Resolve each var to the entry covering it. `entries` do not overlap.
fn covering_resolutions(vars: &[&FreeVar], entries: &[TableEntry], base: usize) -> Vec<Resolution> {
    vars.iter()
        .filter_map(|var| {
            entries
                .iter()
                .position(|e| e.path.covers(&var.path))
                .map(|idx| Resolution {
                    path: var.path.clone(),
                    entry: base + idx,
                })
        })
        .collect()
}

enum FieldWalk {
    Known(Type),
    /// Reached a type the provider has no fields for
    Opaque(Type),
    Missing { field: String, owner: Type },
}

fn walk_fields(root: &Type, fields: &[String], provider: &dyn FieldProvider) -> FieldWalk {
    let mut ty = root.clone();
    for field in fields {
        let Some(declared) = provider.enumerate_fields(&ty) else {
            return FieldWalk::Opaque(ty);
        };
        match declared.into_iter().find(|f| &f.name == field) {
            Some(info) => ty = info.ty,
            None => {
                return FieldWalk::Missing {
                    field: field.clone(),
                    owner: ty.peel_refs().clone(),
                }
            }
        }
    }
    FieldWalk::Known(ty)
}

fn no_such_field(entry: &CaptureEntry, field: &str, owner: &Type) -> Diagnostic {
    Diagnostic::new(
        DiagnosticCode::UnknownField,
        format!("no field `{}` on type `{}`", field, owner),
    )
    .with_span(entry.span)
    .build()
}

/// Explicit field paths are checked when the root's type is known.
fn check_field_path(
    entry: &CaptureEntry,
    ctx: &HostContext,
    provider: &dyn FieldProvider,
) -> Option<Diagnostic> {
    if entry.path.fields.is_empty() || entry.mode == CaptureMode::BoundExpression {
        return None;
    }
    let root_ty = ctx.root_type(&entry.path.root)?;
    match walk_fields(root_ty, &entry.path.fields, provider) {
        FieldWalk::Missing { field, owner } => Some(no_such_field(entry, &field, &owner)),
        FieldWalk::Known(_) | FieldWalk::Opaque(_) => None,
    }
}

/// Reject `name = &place` and `name = &mut place` when `place` is outer
/// storage. Borrowing an earlier by-value entry stays inside the prelude.
fn check_bound_value(entry: &CaptureEntry, earlier: &[CaptureEntry]) -> Option<Diagnostic> {
    let mut value = entry.value.as_ref()?;
    while let ExprKind::Paren(inner) = &value.kind {
        value = &**inner;
    }
    let ExprKind::Unary { op, expr } = &value.kind else {
        return None;
    };
    if !matches!(op, UnaryOp::Ref | UnaryOp::RefMut) {
        return None;
    }
    let path = place_path(expr)?;
    if earlier
        .iter()
        .any(|e| e.mode.is_by_value() && e.name == path.root)
    {
        return None;
    }

    let help = if *op == UnaryOp::RefMut {
        format!(
            "capture `{0}` by value with `{0}` or `+{0}` and mutate the closure's own copy",
            path
        )
    } else {
        format!(
            "capture it with `&{0}`, or bind an independent copy with `+{0}`",
            path
        )
    };
    Some(
        Diagnostic::new(
            DiagnosticCode::BorrowedBoundExpression,
            format!(
                "`{}` borrows `{}` instead of binding an independent value",
                entry.name, path
            ),
        )
        .with_span(entry.span)
        .with_help(help)
        .build(),
    )
}

fn expand_field_wildcard(
    entry: &CaptureEntry,
    ctx: &HostContext,
    provider: &dyn FieldProvider,
) -> Result<Vec<FieldInfo>, Diagnostic> {
    let root = &entry.path.root;
    if entry.path.is_self_rooted() && !ctx.has_self() {
        return Err(Diagnostic::new(
            DiagnosticCode::IllegalSelfWildcardOutsideAggregateContext,
            format!("`+{}` used where there is no `self`", entry.name),
        )
        .with_span(entry.span)
        .with_help("field wildcards over `self` are only allowed inside a method (`impl Type;`)")
        .build());
    }

    let Some(root_ty) = ctx.root_type(root) else {
        return Err(Diagnostic::new(
            DiagnosticCode::UnknownField,
            format!("cannot expand `{}`: the type of `{}` is unknown", entry.name, root),
        )
        .with_span(entry.span)
        .with_help(format!("declare it with `let {}: Type;`", root))
        .build());
    };

    let ty = match walk_fields(root_ty, &entry.path.fields, provider) {
        FieldWalk::Known(ty) | FieldWalk::Opaque(ty) => ty,
        FieldWalk::Missing { field, owner } => return Err(no_such_field(entry, &field, &owner)),
    };
    provider.enumerate_fields(&ty).ok_or_else(|| {
        Diagnostic::new(
            DiagnosticCode::UnknownField,
            format!(
                "cannot expand `{}`: `{}` is not a struct with known fields",
                entry.name, ty
            ),
        )
        .with_span(entry.span)
        .build()
    })
}
