//! Free-variable collection.
//!
//! A closure body is walked once. Identifiers bound by the closure's own
//! parameters, by `let`, or by `for` inside the body are local; everything
//! else is recorded as a path rooted at an outer binding. Field accesses are
//! recorded at full granularity, so `self.some_a` and `self.some_b` are
//! distinct free variables, and a use of `self` on its own is a third.
//!
//! A called identifier (`f(x)`) is taken to be an item unless it names a
//! binding: a local, an outer binding the [`HostContext`] knows, or an entry
//! of the closure's own clause.

use grasp_diagnostics::Span;
use grasp_parser::{
    Block, CaptureMode, CapturePath, ClauseState, Closure, Expr, ExprKind, Stmt, UnaryOp,
};
use grasp_types::HostContext;
use std::collections::BTreeMap;

/// One external path used by a closure body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeVar {
    pub path: CapturePath,
    /// Earliest use site
    pub span: Span,
    /// Assigned to, or borrowed with `&mut`
    pub mutated: bool,
}

/// Free variables of one closure, ordered by first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeVarSet {
    vars: Vec<FreeVar>,
}

impl FreeVarSet {
    pub fn iter(&self) -> impl Iterator<Item = &FreeVar> {
        self.vars.iter()
    }

    pub fn get(&self, path: &CapturePath) -> Option<&FreeVar> {
        self.vars.iter().find(|v| &v.path == path)
    }

    pub fn contains(&self, path: &CapturePath) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<'a> IntoIterator for &'a FreeVarSet {
    type Item = &'a FreeVar;
    type IntoIter = std::slice::Iter<'a, FreeVar>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

/// Collect the free variables of `closure`'s body.
pub fn collect_free_vars(closure: &Closure, ctx: &HostContext) -> FreeVarSet {
    let mut collector = Collector::new(ctx);
    if let ClauseState::Parsed(clause) = &closure.clause {
        collector.clause_roots = clause.entries.iter().map(|e| e.path.root.clone()).collect();
    }
    collector.push_scope();
    for param in &closure.params {
        collector.bind(&param.name.name);
    }
    collector.expr(&closure.body);
    collector.pop_scope();
    collector.finish()
}

/// The capture path of a place expression: an identifier, optionally
/// followed by field accesses. `None` for anything else.
pub fn place_path(expr: &Expr) -> Option<CapturePath> {
    match &expr.kind {
        ExprKind::Ident(ident) => Some(CapturePath::root(ident.name.clone())),
        ExprKind::Field { base, field } => {
            let mut path = place_path(base)?;
            path.fields.push(field.name.clone());
            Some(path)
        }
        _ => None,
    }
}

struct Collector<'a> {
    ctx: &'a HostContext,
    scopes: Vec<Vec<String>>,
    /// Roots named by the closure's own clause
    clause_roots: Vec<String>,
    found: BTreeMap<CapturePath, FreeVar>,
}

impl<'a> Collector<'a> {
    fn new(ctx: &'a HostContext) -> Self {
        Self {
            ctx,
            scopes: Vec::new(),
            clause_roots: Vec::new(),
            found: BTreeMap::new(),
        }
    }

    fn finish(self) -> FreeVarSet {
        let mut vars: Vec<FreeVar> = self.found.into_values().collect();
        // BTreeMap order is by path; re-sort by first use, ties by path.
        vars.sort_by(|a, b| a.span.cmp(&b.span).then_with(|| a.path.cmp(&b.path)));
        log::trace!("collected {} free variables", vars.len());
        FreeVarSet { vars }
    }

    fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(name.to_string());
        }
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.iter().any(|n| n == name))
    }

    fn is_item(&self, name: &str) -> bool {
        !self.is_local(name)
            && !self.ctx.declares(name)
            && !self.clause_roots.iter().any(|root| root == name)
    }

    fn record(&mut self, path: CapturePath, span: Span, mutated: bool) {
        if self.is_local(&path.root) {
            return;
        }
        self.found
            .entry(path.clone())
            .and_modify(|var| {
                if span < var.span {
                    var.span = span;
                }
                var.mutated |= mutated;
            })
            .or_insert(FreeVar {
                path,
                span,
                mutated,
            });
    }

    /// Visit a place that is written through.
    fn mutated_place(&mut self, expr: &Expr) {
        match place_path(expr) {
            Some(path) => self.record(path, expr.span, true),
            None => self.expr(expr),
        }
    }

    fn exprs(&mut self, exprs: &[Expr]) {
        for expr in exprs {
            self.expr(expr);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Lit(_) | ExprKind::Path(_) => {}
            ExprKind::Ident(_) | ExprKind::Field { .. } => match place_path(expr) {
                Some(path) => self.record(path, expr.span, false),
                None => {
                    if let ExprKind::Field { base, .. } = &expr.kind {
                        self.expr(base);
                    }
                }
            },
            ExprKind::MethodCall { receiver, args, .. } => {
                self.expr(receiver);
                self.exprs(args);
            }
            ExprKind::Call { callee, args } => {
                match &callee.kind {
                    ExprKind::Ident(name) if self.is_item(&name.name) => {}
                    _ => self.expr(callee),
                }
                self.exprs(args);
            }
            ExprKind::Macro { args, .. } => self.exprs(args),
            ExprKind::Unary {
                op: UnaryOp::RefMut,
                expr: inner,
            } => self.mutated_place(inner),
            ExprKind::Unary { expr: inner, .. } => self.expr(inner),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Assign { target, value, .. } => {
                self.mutated_place(target);
                self.expr(value);
            }
            ExprKind::Paren(inner) => self.expr(inner),
            ExprKind::Tuple(elems) => self.exprs(elems),
            ExprKind::Block(block) => self.block(block),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(cond);
                self.block(then_branch);
                if let Some(else_branch) = else_branch {
                    self.expr(else_branch);
                }
            }
            ExprKind::While { cond, body } => {
                self.expr(cond);
                self.block(body);
            }
            ExprKind::For {
                binding,
                iter,
                body,
            } => {
                self.expr(iter);
                self.push_scope();
                self.bind(&binding.name);
                self.block(body);
                self.pop_scope();
            }
            ExprKind::Closure(closure) => self.nested_closure(closure),
        }
    }

    fn block(&mut self, block: &Block) {
        self.push_scope();
        for stmt in &block.stmts {
            match stmt {
                Stmt::Let(local) => {
                    if let Some(init) = &local.init {
                        self.expr(init);
                    }
                    self.bind(&local.name.name);
                }
                Stmt::Semi(expr) | Stmt::Expr(expr) => self.expr(expr),
            }
        }
        if let Some(tail) = &block.tail {
            self.expr(tail);
        }
        self.pop_scope();
    }

    /// A nested closure needs from the enclosing scope whatever its own
    /// captures name.
    fn nested_closure(&mut self, closure: &Closure) {
        let ClauseState::Parsed(clause) = &closure.clause else {
            self.push_scope();
            for param in &closure.params {
                self.bind(&param.name.name);
            }
            self.expr(&closure.body);
            self.pop_scope();
            return;
        };

        self.push_scope();
        for entry in &clause.entries {
            match (&entry.mode, &entry.value) {
                (CaptureMode::BoundExpression, Some(value)) => {
                    self.expr(value);
                    self.bind(&entry.name);
                }
                _ => self.record(entry.path.clone(), entry.span, false),
            }
        }
        if clause.wildcard.capture_mode().is_some() {
            for param in &closure.params {
                self.bind(&param.name.name);
            }
            self.expr(&closure.body);
        }
        self.pop_scope();
    }
}
