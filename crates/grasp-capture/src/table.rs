//! The resolved capture table.

use grasp_diagnostics::Span;
use grasp_parser::{CaptureMode, CapturePath, Expr};
use std::fmt;

/// Which resolution strategy built a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// No clause: everything by reference, or by move for `move` closures
    Legacy { is_move: bool },
    /// A clause was written, possibly `[]`
    Explicit,
}

/// Where a table entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    /// Clause entry at this index
    Explicit { index: usize },
    /// Expansion of the field wildcard at this clause index
    FieldWildcard { index: usize },
    /// Clause-level wildcard default
    Wildcard,
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    /// Name the body sees: the path text, or the bound name
    pub name: String,
    pub path: CapturePath,
    pub mode: CaptureMode,
    pub origin: EntryOrigin,
    /// Initialiser of a `BoundExpression` entry
    pub value: Option<Expr>,
    pub span: Span,
}

impl TableEntry {
    pub fn is_explicit(&self) -> bool {
        matches!(self.origin, EntryOrigin::Explicit { .. })
    }
}

/// Mapping from a free-variable path to the entry that authorizes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: CapturePath,
    /// Index into [`CaptureTable::entries`]
    pub entry: usize,
}

/// Capture entries of one closure in prelude order, plus the entry each free
/// variable resolved to. Built once by the resolver and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTable {
    strategy: Strategy,
    entries: Vec<TableEntry>,
    resolutions: Vec<Resolution>,
}

impl CaptureTable {
    pub(crate) fn new(
        strategy: Strategy,
        entries: Vec<TableEntry>,
        resolutions: Vec<Resolution>,
    ) -> Self {
        Self {
            strategy,
            entries,
            resolutions,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self.strategy, Strategy::Legacy { .. })
    }

    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    /// The entry captured for exactly `path`.
    pub fn get(&self, path: &CapturePath) -> Option<&TableEntry> {
        self.entries.iter().find(|e| &e.path == path)
    }

    pub fn mode_of(&self, path: &CapturePath) -> Option<CaptureMode> {
        self.get(path).map(|e| e.mode)
    }

    /// The entry a free-variable path resolved to.
    pub fn resolve(&self, path: &CapturePath) -> Option<&TableEntry> {
        self.resolutions
            .iter()
            .find(|r| &r.path == path)
            .and_then(|r| self.entries.get(r.entry))
    }

    /// Index of the entry a free-variable path resolved to.
    pub fn resolve_index(&self, path: &CapturePath) -> Option<usize> {
        self.resolutions
            .iter()
            .find(|r| &r.path == path)
            .map(|r| r.entry)
    }

    pub fn is_used(&self, index: usize) -> bool {
        self.resolutions.iter().any(|r| r.entry == index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for CaptureTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", entry.name, entry.mode)?;
        }
        write!(f, "}}")
    }
}
