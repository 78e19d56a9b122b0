//! Capture-clause desugaring for grasp
//!
//! This crate drives the whole pipeline over a fragment:
//! - Closures are visited bottom-up, so an enclosing closure sees the prelude
//!   initialisers of the closures nested in it as ordinary uses
//! - Names bound around a closure (`let`, `for`, parameters of enclosing
//!   closures) are handed to its analysis, so calling one of them counts as
//!   a use of a variable
//! - Each closure is analyzed ([`grasp_capture::analyze_closure`]) and, when
//!   its clause resolved cleanly, desugared ([`desugar_closure`])
//! - Diagnostics of all closures are merged and sorted by location

pub mod desugar;
pub mod hygiene;

pub use desugar::{desugar_closure, DesugarOptions};
pub use hygiene::NameAllocator;

use grasp_capture::{analyze_closure, CaptureTable};
use grasp_diagnostics::{Diagnostics, Span};
use grasp_parser::{Block, CaptureMode, ClauseState, Closure, Expr, ExprKind, Fragment, Stmt};
use grasp_types::{FieldProvider, HostContext};

/// What happened to one closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureReport {
    pub span: Span,
    /// `None` when the clause could not be parsed
    pub table: Option<CaptureTable>,
    pub transformed: bool,
}

/// Result of transforming a whole fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub expr: Expr,
    /// One report per closure, innermost first
    pub closures: Vec<ClosureReport>,
    pub diagnostics: Diagnostics,
}

impl TransformOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Transform the expression of `fragment` using its own headers as context.
///
/// `provider` supplies field metadata; pass `fragment.type_table()` or a table
/// merged with other sources.
pub fn transform_fragment(
    fragment: &Fragment,
    provider: &dyn FieldProvider,
    options: &DesugarOptions,
) -> TransformOutput {
    transform_expr(&fragment.expr, &fragment.host_context(), provider, options)
}

/// Transform every closure in `expr`.
pub fn transform_expr(
    expr: &Expr,
    ctx: &HostContext,
    provider: &dyn FieldProvider,
    options: &DesugarOptions,
) -> TransformOutput {
    let mut pass = Pass {
        ctx,
        provider,
        options,
        scopes: Vec::new(),
        closures: Vec::new(),
        diagnostics: Diagnostics::new(),
    };
    let expr = pass.expr(expr.clone());
    log::debug!(
        "transformed {} closures, {} diagnostics",
        pass.closures.len(),
        pass.diagnostics.len()
    );
    TransformOutput {
        expr,
        closures: pass.closures,
        diagnostics: pass.diagnostics.into_sorted(),
    }
}

struct Pass<'a> {
    ctx: &'a HostContext,
    provider: &'a dyn FieldProvider,
    options: &'a DesugarOptions,
    /// Names bound by the code enclosing the current position
    scopes: Vec<Vec<String>>,
    closures: Vec<ClosureReport>,
    diagnostics: Diagnostics,
}

impl<'a> Pass<'a> {
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

    /// The host context plus everything bound around the current position.
    fn enclosing_context(&self) -> HostContext {
        let mut ctx = self.ctx.clone();
        for name in self.scopes.iter().flatten() {
            ctx.bind_local(name.clone());
        }
        ctx
    }

    fn boxed(&mut self, expr: Box<Expr>) -> Box<Expr> {
        Box::new(self.expr(*expr))
    }

    fn exprs(&mut self, exprs: Vec<Expr>) -> Vec<Expr> {
        exprs.into_iter().map(|e| self.expr(e)).collect()
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
        let tail = block.tail.map(|t| self.boxed(t));
        self.pop_scope();
        Block {
            stmts,
            tail,
            span: block.span,
        }
    }

    fn expr(&mut self, expr: Expr) -> Expr {
        let Expr { kind, span } = expr;
        let kind = match kind {
            ExprKind::Closure(mut closure) => {
                // Bound values are evaluated in the enclosing scope.
                if let ClauseState::Parsed(clause) = &mut closure.clause {
                    for entry in &mut clause.entries {
                        entry.value = entry.value.take().map(|v| self.expr(v));
                    }
                }
                self.push_scope();
                for name in closure_bindings(&closure) {
                    self.bind(&name);
                }
                closure.body = self.boxed(closure.body);
                self.pop_scope();
                return self.closure(closure);
            }
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
            kind @ (ExprKind::Lit(_) | ExprKind::Ident(_) | ExprKind::Path(_)) => kind,
        };
        Expr::new(kind, span)
    }

    /// Analyze one closure whose nested closures are already transformed.
    fn closure(&mut self, closure: Closure) -> Expr {
        let span = closure.span;
        let ctx = self.enclosing_context();
        let analysis = analyze_closure(&closure, &ctx, self.provider);
        let has_errors = analysis.has_errors();
        self.diagnostics.extend(analysis.diagnostics);

        let transformed = match (&analysis.table, &closure.clause) {
            (Some(table), ClauseState::Parsed(_)) if !has_errors => {
                Some(desugar_closure(&closure, table, &analysis.free_vars, self.options))
            }
            _ => None,
        };
        if has_errors {
            log::debug!("closure at {}..{} left untransformed", span.start, span.end);
        }

        self.closures.push(ClosureReport {
            span,
            table: analysis.table,
            transformed: transformed.is_some(),
        });
        transformed.unwrap_or_else(|| Expr::new(ExprKind::Closure(closure), span))
    }
}

/// Names a closure body sees besides outer bindings: its parameters and
/// the names its own bound-expression entries introduce.
fn closure_bindings(closure: &Closure) -> Vec<String> {
    let mut names: Vec<String> = closure.params.iter().map(|p| p.name.name.clone()).collect();
    if let ClauseState::Parsed(clause) = &closure.clause {
        names.extend(
            clause
                .entries
                .iter()
                .filter(|e| e.mode == CaptureMode::BoundExpression)
                .map(|e| e.name.clone()),
        );
    }
    names
}
