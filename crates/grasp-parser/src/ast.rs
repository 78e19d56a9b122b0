//! Syntax tree for host fragments and capture clauses.

use crate::error::ClauseError;
use grasp_diagnostics::Span;
use grasp_types::{FieldInfo, HostContext, StructDef, Type, TypeTable};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }

    pub fn is_self(&self) -> bool {
        self.name == "self"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn ident(ident: Ident) -> Self {
        let span = ident.span;
        Self::new(ExprKind::Ident(ident), span)
    }

    /// Blocks and control flow that can stand as a statement without `;`.
    pub fn is_block_like(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Block(_) | ExprKind::If { .. } | ExprKind::While { .. } | ExprKind::For { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Lit(Lit),
    /// A variable, or `self`
    Ident(Ident),
    /// Qualified item path such as `Clone::clone`
    Path(Vec<Ident>),
    Field {
        base: Box<Expr>,
        field: Ident,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: Ident,
        args: Vec<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Macro {
        name: Ident,
        delim: MacroDelim,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Paren(Box<Expr>),
    Tuple(Vec<Expr>),
    Block(Block),
    If {
        cond: Box<Expr>,
        then_branch: Block,
        else_branch: Option<Box<Expr>>,
    },
    While {
        cond: Box<Expr>,
        body: Block,
    },
    For {
        binding: Ident,
        iter: Box<Expr>,
        body: Block,
    },
    Closure(Closure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lit {
    Int(u64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroDelim {
    Paren,
    Bracket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Deref,
    Ref,
    RefMut,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Deref => "*",
            UnaryOp::Ref => "&",
            UnaryOp::RefMut => "&mut ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    /// Binding power; higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 3,
            BinOp::Add | BinOp::Sub => 4,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

impl AssignOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
            AssignOp::DivAssign => "/=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub tail: Option<Box<Expr>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Let(Local),
    /// Expression followed by `;`
    Semi(Expr),
    /// Block-like expression without `;`
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    pub mutable: bool,
    pub name: Ident,
    pub ty: Option<Type>,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    pub clause: ClauseState,
    pub is_move: bool,
    pub params: Vec<Param>,
    pub body: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub mutable: bool,
    pub name: Ident,
    pub ty: Option<Type>,
}

/// What precedes a closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseState {
    /// No brackets at all: legacy implicit capture
    Absent,
    Parsed(CaptureClause),
    /// Brackets were balanced but the contents were not a valid clause
    Invalid {
        text: String,
        span: Span,
        errors: Vec<ClauseError>,
    },
}

/// An identifier optionally followed by field accesses: `self.some_a`, `pair.0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CapturePath {
    pub root: String,
    pub fields: Vec<String>,
}

impl CapturePath {
    pub fn root(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            fields: Vec::new(),
        }
    }

    pub fn new(root: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            root: root.into(),
            fields,
        }
    }

    pub fn child(&self, field: impl Into<String>) -> Self {
        let mut fields = self.fields.clone();
        fields.push(field.into());
        Self {
            root: self.root.clone(),
            fields,
        }
    }

    pub fn is_self_rooted(&self) -> bool {
        self.root == "self"
    }

    /// Number of segments including the root.
    pub fn len(&self) -> usize {
        1 + self.fields.len()
    }

    /// Whether `self` equals `other` or is a prefix of it.
    pub fn covers(&self, other: &CapturePath) -> bool {
        self.root == other.root
            && self.fields.len() <= other.fields.len()
            && self.fields.iter().zip(&other.fields).all(|(a, b)| a == b)
    }

    /// Whether `self` is a prefix of `other` and shorter than it.
    pub fn is_strict_prefix_of(&self, other: &CapturePath) -> bool {
        self.fields.len() < other.fields.len() && self.covers(other)
    }
}

impl fmt::Display for CapturePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for field in &self.fields {
            write!(f, ".{}", field)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CaptureMode {
    Reference,
    Move,
    Clone,
    BoundExpression,
    FieldWildcardClone,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Reference => "Reference",
            CaptureMode::Move => "Move",
            CaptureMode::Clone => "Clone",
            CaptureMode::BoundExpression => "BoundExpression",
            CaptureMode::FieldWildcardClone => "FieldWildcardClone",
        }
    }

    /// Whether the closure ends up owning an independent value.
    pub fn is_by_value(&self) -> bool {
        !matches!(self, CaptureMode::Reference)
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clause-level default for free variables without an explicit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WildcardMode {
    #[default]
    None,
    /// `&`
    ReferenceAll,
    /// `=`
    MoveAll,
    /// `+`
    CloneAll,
}

impl WildcardMode {
    /// The capture mode applied to wildcard-covered variables.
    pub fn capture_mode(&self) -> Option<CaptureMode> {
        match self {
            WildcardMode::None => None,
            WildcardMode::ReferenceAll => Some(CaptureMode::Reference),
            WildcardMode::MoveAll => Some(CaptureMode::Move),
            WildcardMode::CloneAll => Some(CaptureMode::Clone),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            WildcardMode::None => "",
            WildcardMode::ReferenceAll => "&",
            WildcardMode::MoveAll => "=",
            WildcardMode::CloneAll => "+",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEntry {
    /// Binding name; unique within the clause
    pub name: String,
    pub path: CapturePath,
    pub mode: CaptureMode,
    /// Initialiser of a `BoundExpression` entry
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureClause {
    pub entries: Vec<CaptureEntry>,
    pub wildcard: WildcardMode,
    pub span: Span,
}

impl CaptureClause {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.wildcard == WildcardMode::None
    }
}

/// A parsed input: context declarations followed by one expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub structs: Vec<StructDecl>,
    /// Receiver type from `impl T;`
    pub impl_ty: Option<Type>,
    pub bindings: Vec<BindingDecl>,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDecl {
    pub name: Ident,
    pub fields: Vec<(Ident, Type)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDecl {
    pub name: Ident,
    pub ty: Type,
}

impl Fragment {
    /// Field metadata declared by the fragment's `struct` headers.
    pub fn type_table(&self) -> TypeTable {
        let mut table = TypeTable::new();
        for decl in &self.structs {
            let fields = decl
                .fields
                .iter()
                .map(|(name, ty)| FieldInfo::new(name.name.clone(), ty.clone()))
                .collect();
            table.insert(StructDef::new(decl.name.name.clone(), fields));
        }
        table
    }

    /// Scope information from the `impl` and `let` headers. Inside
    /// `impl T;` the receiver `self` has type `&T`.
    pub fn host_context(&self) -> HostContext {
        let mut ctx = match &self.impl_ty {
            Some(ty) => HostContext::new().with_self(Type::reference(ty.clone())),
            None => HostContext::new(),
        };
        for binding in &self.bindings {
            ctx.declare(binding.name.name.clone(), binding.ty.clone());
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(text: &str) -> CapturePath {
        let mut parts = text.split('.');
        let root = parts.next().unwrap_or_default();
        CapturePath::new(root, parts.map(str::to_string).collect())
    }

    #[test]
    fn test_prefix_relations() {
        assert!(path("self").covers(&path("self.some_a")));
        assert!(path("self").is_strict_prefix_of(&path("self.some_a.x")));
        assert!(path("self.some_a").covers(&path("self.some_a")));
        assert!(!path("self.some_a").is_strict_prefix_of(&path("self.some_a")));
        assert!(!path("self.some_a").covers(&path("self.some_b")));
        assert!(!path("my").covers(&path("my_vec")));
    }

    #[test]
    fn test_path_display() {
        assert_eq!(path("self.some_a").to_string(), "self.some_a");
        assert_eq!(CapturePath::root("pair").child("0").to_string(), "pair.0");
    }

    #[test]
    fn test_wildcard_modes() {
        assert_eq!(WildcardMode::None.capture_mode(), None);
        assert_eq!(WildcardMode::MoveAll.capture_mode(), Some(CaptureMode::Move));
        assert!(!CaptureMode::Reference.is_by_value());
        assert!(CaptureMode::FieldWildcardClone.is_by_value());
    }
}
