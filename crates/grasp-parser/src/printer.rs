//! Deterministic pretty-printer.
//!
//! Output uses 4-space indentation and re-parses to the same tree; the
//! desugarer relies on this to emit readable fragments.

use crate::ast::*;
use std::fmt::Write;

const INDENT: &str = "    ";

pub fn print_expr(expr: &Expr) -> String {
    let mut printer = Printer::default();
    printer.expr(expr);
    printer.out
}

/// Clause text with the wildcard first, e.g. `[&, my_vec, +self.*, n = 1]`.
pub fn print_clause(clause: &CaptureClause) -> String {
    let mut parts = Vec::new();
    if clause.wildcard != WildcardMode::None {
        parts.push(clause.wildcard.symbol().to_string());
    }
    for entry in &clause.entries {
        let part = match entry.mode {
            CaptureMode::Reference => format!("&{}", entry.path),
            CaptureMode::Move => entry.path.to_string(),
            CaptureMode::Clone => format!("+{}", entry.path),
            CaptureMode::FieldWildcardClone => format!("+{}.*", entry.path),
            CaptureMode::BoundExpression => match &entry.value {
                Some(value) => format!("{} = {}", entry.name, print_expr(value)),
                None => entry.name.clone(),
            },
        };
        parts.push(part);
    }
    format!("[{}]", parts.join(", "))
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn list(&mut self, items: &[Expr]) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(item);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Lit(Lit::Int(value)) => {
                let _ = write!(self.out, "{}", value);
            }
            ExprKind::Lit(Lit::Str(value)) => {
                let _ = write!(self.out, "{:?}", value);
            }
            ExprKind::Lit(Lit::Bool(value)) => {
                let _ = write!(self.out, "{}", value);
            }
            ExprKind::Ident(ident) => self.push(&ident.name),
            ExprKind::Path(segments) => {
                let joined = segments
                    .iter()
                    .map(|s| s.name.as_str())
                    .collect::<Vec<_>>()
                    .join("::");
                self.push(&joined);
            }
            ExprKind::Field { base, field } => {
                self.expr(base);
                self.push(".");
                self.push(&field.name);
            }
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                self.expr(receiver);
                self.push(".");
                self.push(&method.name);
                self.push("(");
                self.list(args);
                self.push(")");
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee);
                self.push("(");
                self.list(args);
                self.push(")");
            }
            ExprKind::Macro { name, delim, args } => {
                self.push(&name.name);
                let (open, close) = match delim {
                    MacroDelim::Paren => ("!(", ")"),
                    MacroDelim::Bracket => ("![", "]"),
                };
                self.push(open);
                self.list(args);
                self.push(close);
            }
            ExprKind::Unary { op, expr } => {
                self.push(op.as_str());
                self.expr(expr);
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.expr(lhs);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.expr(rhs);
            }
            ExprKind::Assign { op, target, value } => {
                self.expr(target);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.expr(value);
            }
            ExprKind::Paren(inner) => {
                self.push("(");
                self.expr(inner);
                self.push(")");
            }
            ExprKind::Tuple(elems) => {
                self.push("(");
                self.list(elems);
                if elems.len() == 1 {
                    self.push(",");
                }
                self.push(")");
            }
            ExprKind::Block(block) => self.block(block),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.push("if ");
                self.expr(cond);
                self.push(" ");
                self.block(then_branch);
                if let Some(else_branch) = else_branch {
                    self.push(" else ");
                    self.expr(else_branch);
                }
            }
            ExprKind::While { cond, body } => {
                self.push("while ");
                self.expr(cond);
                self.push(" ");
                self.block(body);
            }
            ExprKind::For {
                binding,
                iter,
                body,
            } => {
                self.push("for ");
                self.push(&binding.name);
                self.push(" in ");
                self.expr(iter);
                self.push(" ");
                self.block(body);
            }
            ExprKind::Closure(closure) => self.closure(closure),
        }
    }

    fn block(&mut self, block: &Block) {
        if block.stmts.is_empty() && block.tail.is_none() {
            self.push("{}");
            return;
        }
        self.push("{");
        self.depth += 1;
        for stmt in &block.stmts {
            self.newline();
            match stmt {
                Stmt::Let(local) => self.local(local),
                Stmt::Semi(expr) => {
                    self.expr(expr);
                    self.push(";");
                }
                Stmt::Expr(expr) => self.expr(expr),
            }
        }
        if let Some(tail) = &block.tail {
            self.newline();
            self.expr(tail);
        }
        self.depth -= 1;
        self.newline();
        self.push("}");
    }

    fn local(&mut self, local: &Local) {
        self.push("let ");
        if local.mutable {
            self.push("mut ");
        }
        self.push(&local.name.name);
        if let Some(ty) = &local.ty {
            let _ = write!(self.out, ": {}", ty);
        }
        if let Some(init) = &local.init {
            self.push(" = ");
            self.expr(init);
        }
        self.push(";");
    }

    fn closure(&mut self, closure: &Closure) {
        match &closure.clause {
            ClauseState::Absent => {}
            ClauseState::Parsed(clause) => {
                self.push(&print_clause(clause));
                self.push(" ");
            }
            ClauseState::Invalid { text, .. } => {
                self.push(text);
                self.push(" ");
            }
        }
        if closure.is_move {
            self.push("move ");
        }
        if closure.params.is_empty() {
            self.push("||");
        } else {
            self.push("|");
            for (i, param) in closure.params.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                if param.mutable {
                    self.push("mut ");
                }
                self.push(&param.name.name);
                if let Some(ty) = &param.ty {
                    let _ = write!(self.out, ": {}", ty);
                }
            }
            self.push("|");
        }
        self.push(" ");
        self.expr(&closure.body);
    }
}
