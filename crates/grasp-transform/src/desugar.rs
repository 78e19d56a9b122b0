//! Desugaring of clause-annotated closures.
//!
//! A closure with a non-empty capture table becomes a block that first binds
//! every capture to a fresh local and then yields a plain `move` closure
//! whose body refers only to those locals:
//!
//! ```text
//! [&v, +a] || f(v, a)
//! ==>
//! {
//!     let __cap_v = &v;
//!     let __cap_a = Clone::clone(&a);
//!     move || f(__cap_v, __cap_a)
//! }
//! ```
//!
//! `Clone` and `BoundExpression` bindings own fresh values, so nothing the
//! body does through them reaches the outer binding. A clone of the receiver
//! goes through `&*self` so the referent is cloned rather than the reference,
//! and `name = self` is bound the same way.

use crate::hygiene::NameAllocator;
use grasp_capture::{place_path, CaptureTable, FreeVarSet};
use grasp_diagnostics::Span;
use grasp_parser::{
    Block, CaptureMode, CapturePath, ClauseState, Closure, Expr, ExprKind, Ident, Local, Stmt,
    UnaryOp,
};

/// Desugaring settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesugarOptions {
    /// Prefix of generated binding names
    pub binding_prefix: String,
}

impl Default for DesugarOptions {
    fn default() -> Self {
        Self {
            binding_prefix: "__cap_".to_string(),
        }
    }
}

/// Rewrite `closure` according to its resolved `table`.
///
/// Legacy closures come back unchanged. An explicit clause whose table is
/// empty only loses its clause.
pub fn desugar_closure(
    closure: &Closure,
    table: &CaptureTable,
    free: &FreeVarSet,
    options: &DesugarOptions,
) -> Expr {
    if table.is_legacy() {
        return Expr::new(ExprKind::Closure(closure.clone()), closure.span);
    }
    if table.is_empty() {
        let mut plain = closure.clone();
        plain.clause = ClauseState::Absent;
        return Expr::new(ExprKind::Closure(plain), closure.span);
    }

    let span = closure.span;
    let mut allocator = NameAllocator::for_closure(options.binding_prefix.clone(), closure);
    let names: Vec<String> = table
        .entries()
        .iter()
        .map(|entry| allocator.fresh(&entry.path))
        .collect();

    let mut stmts = Vec::with_capacity(names.len());
    for (idx, entry) in table.entries().iter().enumerate() {
        let init = match entry.mode {
            CaptureMode::Reference => reference_to(&entry.path, span),
            CaptureMode::Move => path_expr(&entry.path, span),
            CaptureMode::Clone | CaptureMode::FieldWildcardClone => clone_of(&entry.path, span),
            CaptureMode::BoundExpression if entry.value.as_ref().is_some_and(is_receiver) => {
                clone_of(&CapturePath::root("self"), span)
            }
            CaptureMode::BoundExpression => {
                let value = entry
                    .value
                    .clone()
                    .unwrap_or_else(|| path_expr(&entry.path, span));
                // Earlier clause bindings are visible to later initialisers.
                let earlier = &table.entries()[..idx];
                let lookup = |path: &CapturePath| {
                    earlier
                        .iter()
                        .enumerate()
                        .filter(|(_, e)| e.path.covers(path))
                        .max_by_key(|(_, e)| e.path.len())
                        .map(|(i, _)| i)
                };
                let value = Rewriter::new(table, &names, &lookup).expr(value);
                let value_span = value.span;
                Expr::new(ExprKind::Paren(Box::new(value)), value_span)
            }
        };
        let mutable = entry.mode.is_by_value()
            && free
                .iter()
                .any(|var| var.mutated && table.resolve_index(&var.path) == Some(idx));
        stmts.push(Stmt::Let(Local {
            mutable,
            name: Ident::new(names[idx].clone(), entry.span),
            ty: None,
            init: Some(init),
            span: entry.span,
        }));
    }

    let lookup = |path: &CapturePath| table.resolve_index(path);
    let mut rewriter = Rewriter::new(table, &names, &lookup);
    rewriter.push_scope();
    for param in &closure.params {
        rewriter.bind(&param.name.name);
    }
    let body = rewriter.expr((*closure.body).clone());

    log::debug!("desugared closure with {} prelude bindings", stmts.len());

    let inner = Closure {
        clause: ClauseState::Absent,
        is_move: true,
        params: closure.params.clone(),
        body: Box::new(body),
        span,
    };
    Expr::new(
        ExprKind::Block(Block {
            stmts,
            tail: Some(Box::new(Expr::new(ExprKind::Closure(inner), span))),
            span,
        }),
        span,
    )
}

fn path_expr(path: &CapturePath, span: Span) -> Expr {
    let mut expr = Expr::ident(Ident::new(path.root.clone(), span));
    for field in &path.fields {
        expr = Expr::new(
            ExprKind::Field {
                base: Box::new(expr),
                field: Ident::new(field.clone(), span),
            },
            span,
        );
    }
    expr
}

/// `self`, possibly parenthesized.
fn is_receiver(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Ident(ident) => ident.name == "self",
        ExprKind::Paren(inner) => is_receiver(inner),
        _ => false,
    }
}

fn unary(op: UnaryOp, expr: Expr) -> Expr {
    let span = expr.span;
    Expr::new(
        ExprKind::Unary {
            op,
            expr: Box::new(expr),
        },
        span,
    )
}

/// `&path`, or `&*self` for the receiver itself.
fn reference_to(path: &CapturePath, span: Span) -> Expr {
    let place = path_expr(path, span);
    if path.is_self_rooted() && path.fields.is_empty() {
        unary(UnaryOp::Ref, unary(UnaryOp::Deref, place))
    } else {
        unary(UnaryOp::Ref, place)
    }
}

/// `Clone::clone(&path)`.
fn clone_of(path: &CapturePath, span: Span) -> Expr {
    let callee = Expr::new(
        ExprKind::Path(vec![Ident::new("Clone", span), Ident::new("clone", span)]),
        span,
    );
    Expr::new(
        ExprKind::Call {
            callee: Box::new(callee),
            args: vec![reference_to(path, span)],
        },
        span,
    )
}

/// Rewrites uses of captured paths to their prelude bindings.
struct Rewriter<'a> {
    table: &'a CaptureTable,
    names: &'a [String],
    lookup: &'a dyn Fn(&CapturePath) -> Option<usize>,
    scopes: Vec<Vec<String>>,
}

impl<'a> Rewriter<'a> {
    fn new(
        table: &'a CaptureTable,
        names: &'a [String],
        lookup: &'a dyn Fn(&CapturePath) -> Option<usize>,
    ) -> Self {
        Self {
            table,
            names,
            lookup,
            scopes: Vec::new(),
        }
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

    fn exprs(&mut self, exprs: Vec<Expr>) -> Vec<Expr> {
        exprs.into_iter().map(|e| self.expr(e)).collect()
    }

    fn boxed(&mut self, expr: Box<Expr>) -> Box<Expr> {
        Box::new(self.expr(*expr))
    }

    fn expr(&mut self, expr: Expr) -> Expr {
        if let Some(path) = place_path(&expr) {
            if self.is_local(&path.root) {
                return expr;
            }
            return match (self.lookup)(&path) {
                Some(idx) => {
                    let entry = &self.table.entries()[idx];
                    let depth = path.fields.len() - entry.path.fields.len();
                    replace_prefix(expr, depth, &self.names[idx])
                }
                None => expr,
            };
        }

        let Expr { kind, span } = expr;
        let kind = match kind {
            ExprKind::Field { base, field } => ExprKind::Field {
                base: self.boxed(base),
                field,
            },
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => ExprKind::MethodCall {
                receiver: self.boxed(receiver),
                method,
                args: self.exprs(args),
            },
            ExprKind::Call { callee, args } => ExprKind::Call {
                callee: self.boxed(callee),
                args: self.exprs(args),
            },
            ExprKind::Macro { name, delim, args } => ExprKind::Macro {
                name,
                delim,
                args: self.exprs(args),
            },
            ExprKind::Unary { op, expr } => ExprKind::Unary {
                op,
                expr: self.boxed(expr),
            },
            ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
                op,
                lhs: self.boxed(lhs),
                rhs: self.boxed(rhs),
            },
            ExprKind::Assign { op, target, value } => ExprKind::Assign {
                op,
                target: self.boxed(target),
                value: self.boxed(value),
            },
            ExprKind::Paren(inner) => ExprKind::Paren(self.boxed(inner)),
            ExprKind::Tuple(elems) => ExprKind::Tuple(self.exprs(elems)),
            ExprKind::Block(block) => ExprKind::Block(self.block(block)),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => ExprKind::If {
                cond: self.boxed(cond),
                then_branch: self.block(then_branch),
                else_branch: else_branch.map(|e| self.boxed(e)),
            },
            ExprKind::While { cond, body } => ExprKind::While {
                cond: self.boxed(cond),
                body: self.block(body),
            },
            ExprKind::For {
                binding,
                iter,
                body,
            } => {
                let iter = self.boxed(iter);
                self.push_scope();
                self.bind(&binding.name);
                let body = self.block(body);
                self.pop_scope();
                ExprKind::For {
                    binding,
                    iter,
                    body,
                }
            }
            ExprKind::Closure(mut closure) => {
                self.push_scope();
                for param in &closure.params {
                    self.bind(&param.name.name);
                }
                closure.body = self.boxed(closure.body);
                self.pop_scope();
                ExprKind::Closure(closure)
            }
            kind @ (ExprKind::Lit(_) | ExprKind::Ident(_) | ExprKind::Path(_)) => kind,
        };
        Expr::new(kind, span)
    }

    fn block(&mut self, block: Block) -> Block {
        self.push_scope();
        let stmts = block
            .stmts
            .into_iter()
            .map(|stmt| match stmt {
                Stmt::Let(mut local) => {
                    local.init = local.init.map(|init| self.expr(init));
                    self.bind(&local.name.name);
                    Stmt::Let(local)
                }
                Stmt::Semi(expr) => Stmt::Semi(self.expr(expr)),
                Stmt::Expr(expr) => Stmt::Expr(self.expr(expr)),
            })
            .collect();
        let tail = block.tail.map(|tail| self.boxed(tail));
        self.pop_scope();
        Block {
            stmts,
            tail,
            span: block.span,
        }
    }
}

/// Replace the place `depth` field accesses below `expr` with `name`.
fn replace_prefix(expr: Expr, depth: usize, name: &str) -> Expr {
    if depth == 0 {
        return Expr::ident(Ident::new(name, expr.span));
    }
    match expr.kind {
        ExprKind::Field { base, field } => Expr::new(
            ExprKind::Field {
                base: Box::new(replace_prefix(*base, depth - 1, name)),
                field,
            },
            expr.span,
        ),
        kind => Expr::new(kind, expr.span),
    }
}
