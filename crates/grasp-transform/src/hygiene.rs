//! Fresh names for prelude bindings.

use grasp_parser::{Block, CapturePath, ClauseState, Closure, Expr, ExprKind, Stmt};
use std::collections::BTreeSet;

/// Hands out binding names that collide with nothing the closure mentions
/// and with no name handed out before.
#[derive(Debug, Clone)]
pub struct NameAllocator {
    prefix: String,
    taken: BTreeSet<String>,
}

impl NameAllocator {
    pub fn new(prefix: impl Into<String>, taken: BTreeSet<String>) -> Self {
        Self {
            prefix: prefix.into(),
            taken,
        }
    }

    /// Allocator seeded with every variable name appearing in `closure`.
    pub fn for_closure(prefix: impl Into<String>, closure: &Closure) -> Self {
        let mut taken = BTreeSet::new();
        closure_names(closure, &mut taken);
        Self::new(prefix, taken)
    }

    /// `<prefix><path with '.' replaced by '_'>`, suffixed `_1`, `_2`, ...
    /// until unused.
    pub fn fresh(&mut self, path: &CapturePath) -> String {
        let base = format!("{}{}", self.prefix, path.to_string().replace('.', "_"));
        let mut candidate = base.clone();
        let mut n = 0;
        while self.taken.contains(&candidate) {
            n += 1;
            candidate = format!("{}_{}", base, n);
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}

fn closure_names(closure: &Closure, out: &mut BTreeSet<String>) {
    for param in &closure.params {
        out.insert(param.name.name.clone());
    }
    if let ClauseState::Parsed(clause) = &closure.clause {
        for entry in &clause.entries {
            out.insert(entry.path.root.clone());
            out.insert(entry.name.clone());
            if let Some(value) = &entry.value {
                expr_names(value, out);
            }
        }
    }
    expr_names(&closure.body, out);
}

fn block_names(block: &Block, out: &mut BTreeSet<String>) {
    for stmt in &block.stmts {
        match stmt {
            Stmt::Let(local) => {
                out.insert(local.name.name.clone());
                if let Some(init) = &local.init {
                    expr_names(init, out);
                }
            }
            Stmt::Semi(expr) | Stmt::Expr(expr) => expr_names(expr, out),
        }
    }
    if let Some(tail) = &block.tail {
        expr_names(tail, out);
    }
}

fn expr_names(expr: &Expr, out: &mut BTreeSet<String>) {
    match &expr.kind {
        ExprKind::Lit(_) | ExprKind::Path(_) => {}
        ExprKind::Ident(ident) => {
            out.insert(ident.name.clone());
        }
        ExprKind::Field { base, .. } => expr_names(base, out),
        ExprKind::MethodCall { receiver, args, .. } => {
            expr_names(receiver, out);
            args.iter().for_each(|a| expr_names(a, out));
        }
        ExprKind::Call { callee, args } => {
            expr_names(callee, out);
            args.iter().for_each(|a| expr_names(a, out));
        }
        ExprKind::Macro { args, .. } | ExprKind::Tuple(args) => {
            args.iter().for_each(|a| expr_names(a, out));
        }
        ExprKind::Unary { expr, .. } | ExprKind::Paren(expr) => expr_names(expr, out),
        ExprKind::Binary { lhs, rhs, .. } => {
            expr_names(lhs, out);
            expr_names(rhs, out);
        }
        ExprKind::Assign { target, value, .. } => {
            expr_names(target, out);
            expr_names(value, out);
        }
        ExprKind::Block(block) => block_names(block, out),
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            expr_names(cond, out);
            block_names(then_branch, out);
            if let Some(else_branch) = else_branch {
                expr_names(else_branch, out);
            }
        }
        ExprKind::While { cond, body } => {
            expr_names(cond, out);
            block_names(body, out);
        }
        ExprKind::For {
            binding,
            iter,
            body,
        } => {
            out.insert(binding.name.clone());
            expr_names(iter, out);
            block_names(body, out);
        }
        ExprKind::Closure(closure) => closure_names(closure, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grasp_parser::parse_expr;

    fn closure(source: &str) -> Closure {
        match parse_expr(source).unwrap().kind {
            ExprKind::Closure(c) => c,
            _ => panic!("expected closure"),
        }
    }

    #[test]
    fn test_fresh_names_flatten_paths() {
        let mut names = NameAllocator::new("__cap_", BTreeSet::new());
        let path = CapturePath::new("self", vec!["some_a".to_string()]);
        assert_eq!(names.fresh(&path), "__cap_self_some_a");
        assert_eq!(names.fresh(&CapturePath::root("pair")), "__cap_pair");
    }

    #[test]
    fn test_fresh_names_avoid_closure_identifiers() {
        let c = closure("[&v] |__cap_v| { let __cap_v_1 = __cap_v; v.len() + __cap_v_1 }");
        let mut names = NameAllocator::for_closure("__cap_", &c);
        assert_eq!(names.fresh(&CapturePath::root("v")), "__cap_v_2");
    }

    #[test]
    fn test_fresh_names_never_repeat() {
        let mut names = NameAllocator::new("__cap_", BTreeSet::new());
        // `a.b` and `a_b` flatten to the same base name
        let first = names.fresh(&CapturePath::new("a", vec!["b".to_string()]));
        let second = names.fresh(&CapturePath::root("a_b"));
        assert_eq!(first, "__cap_a_b");
        assert_eq!(second, "__cap_a_b_1");
    }
}
