//! Recursive-descent parser for host fragments.
//!
//! Binary operators use precedence climbing; assignment is right associative
//! and binds loosest. A `[` in expression position always opens a capture
//! clause, which must be followed by a closure.

use crate::ast::*;
use crate::clause;
use crate::error::SyntaxError;
use crate::lexer::{Token, TokenKind};
use grasp_diagnostics::Span;
use grasp_types::Type;

pub(crate) type PResult<T> = Result<T, SyntaxError>;

pub(crate) struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    prev_span: Span,
}

impl<'src> Parser<'src> {
    /// `tokens` must end with an `Eof` token.
    pub(crate) fn new(tokens: Vec<Token>, source: &'src str) -> Self {
        let prev_span = tokens.first().map(|t| t.span).unwrap_or_default();
        Self {
            source,
            tokens,
            pos: 0,
            prev_span,
        }
    }

    // ===== Token cursor =====

    pub(crate) fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    pub(crate) fn peek_at(&self, n: usize) -> &TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    pub(crate) fn current_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    pub(crate) fn prev_span(&self) -> Span {
        self.prev_span
    }

    pub(crate) fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    pub(crate) fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        self.prev_span = token.span;
        token
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    pub(crate) fn unexpected(&self, expected: &str) -> SyntaxError {
        SyntaxError::new(
            format!("expected {}, found {}", expected, self.peek().describe()),
            self.current_span(),
        )
    }

    pub(crate) fn expect_ident(&mut self) -> PResult<Ident> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                let token = self.bump();
                Ok(Ident::new(name, token.span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn slice(&self, span: Span) -> &'src str {
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or_default()
    }

    // ===== Fragments =====

    pub(crate) fn parse_fragment(&mut self) -> PResult<Fragment> {
        let mut structs = Vec::new();
        let mut impl_ty = None;
        let mut bindings = Vec::new();

        loop {
            match self.peek() {
                TokenKind::Struct => structs.push(self.parse_struct_decl()?),
                TokenKind::Impl => {
                    self.bump();
                    let ty = self.parse_type()?;
                    self.expect(&TokenKind::Semi)?;
                    if impl_ty.is_some() {
                        log::debug!("`impl` header repeated, keeping `{}`", ty);
                    }
                    impl_ty = Some(ty);
                }
                TokenKind::Let => {
                    self.bump();
                    let name = self.expect_ident()?;
                    self.expect(&TokenKind::Colon)?;
                    let ty = self.parse_type()?;
                    self.expect(&TokenKind::Semi)?;
                    bindings.push(BindingDecl { name, ty });
                }
                _ => break,
            }
        }

        let expr = self.parse_expr()?;
        self.eat(&TokenKind::Semi);
        if !self.at_eof() {
            return Err(self.unexpected("end of input"));
        }

        Ok(Fragment {
            structs,
            impl_ty,
            bindings,
            expr,
        })
    }

    fn parse_struct_decl(&mut self) -> PResult<StructDecl> {
        self.expect(&TokenKind::Struct)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let field = self.expect_ident()?;
            self.expect(&TokenKind::Colon)?;
            let ty = self.parse_type()?;
            fields.push((field, ty));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(StructDecl { name, fields })
    }

    // ===== Types =====

    pub(crate) fn parse_type(&mut self) -> PResult<Type> {
        match self.peek() {
            TokenKind::Amp => {
                self.bump();
                let mutable = self.eat(&TokenKind::Mut);
                let inner = self.parse_type()?;
                Ok(Type::Ref {
                    mutable,
                    inner: Box::new(inner),
                })
            }
            TokenKind::AmpAmp => {
                self.bump();
                let mutable = self.eat(&TokenKind::Mut);
                let inner = self.parse_type()?;
                Ok(Type::reference(Type::Ref {
                    mutable,
                    inner: Box::new(inner),
                }))
            }
            TokenKind::LParen => {
                self.bump();
                let mut elems = Vec::new();
                while !self.check(&TokenKind::RParen) {
                    elems.push(self.parse_type()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RParen)?;
                Ok(Type::Tuple(elems))
            }
            TokenKind::Ident(_) | TokenKind::SelfValue => {
                let mut name = self.type_segment()?;
                while self.eat(&TokenKind::ColonColon) {
                    name.push_str("::");
                    name.push_str(&self.type_segment()?);
                }
                let mut args = Vec::new();
                if self.eat(&TokenKind::Lt) {
                    while !self.check(&TokenKind::Gt) {
                        args.push(self.parse_type()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::Gt)?;
                }
                Ok(Type::Named { name, args })
            }
            _ => Err(self.unexpected("type")),
        }
    }

    fn type_segment(&mut self) -> PResult<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.bump();
                Ok(name)
            }
            TokenKind::SelfValue => {
                self.bump();
                Ok("self".to_string())
            }
            _ => Err(self.unexpected("type name")),
        }
    }

    // ===== Expressions =====

    pub(crate) fn parse_expr(&mut self) -> PResult<Expr> {
        let lhs = self.parse_binary(0)?;
        let op = match self.peek() {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::AddAssign,
            TokenKind::MinusEq => AssignOp::SubAssign,
            TokenKind::StarEq => AssignOp::MulAssign,
            TokenKind::SlashEq => AssignOp::DivAssign,
            _ => return Ok(lhs),
        };
        self.bump();
        let value = self.parse_expr()?;
        let span = lhs.span.merge(value.span);
        Ok(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(lhs),
                value: Box::new(value),
            },
            span,
        ))
    }

    fn binary_op(&self) -> Option<BinOp> {
        let op = match self.peek() {
            TokenKind::PipePipe => BinOp::Or,
            TokenKind::AmpAmp => BinOp::And,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::NotEq => BinOp::Ne,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Le => BinOp::Le,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Rem,
            _ => return None,
        };
        Some(op)
    }

    /// Operators binding tighter than `min_prec`; assignment excluded.
    pub(crate) fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.binary_op() {
            let prec = op.precedence();
            if prec <= min_prec {
                break;
            }
            self.bump();
            let rhs = self.parse_binary(prec)?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Star => UnaryOp::Deref,
            TokenKind::Amp => UnaryOp::Ref,
            TokenKind::AmpAmp => {
                // `&&x` is a reference to a reference
                self.bump();
                let op = if self.eat(&TokenKind::Mut) {
                    UnaryOp::RefMut
                } else {
                    UnaryOp::Ref
                };
                let expr = self.parse_unary()?;
                let inner_span = Span::new(start.file_id, start.start + 1, expr.span.end);
                let inner = Expr::new(
                    ExprKind::Unary {
                        op,
                        expr: Box::new(expr),
                    },
                    inner_span,
                );
                let span = start.merge(inner.span);
                return Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Ref,
                        expr: Box::new(inner),
                    },
                    span,
                ));
            }
            _ => return self.parse_postfix(),
        };
        self.bump();
        let op = if op == UnaryOp::Ref && self.eat(&TokenKind::Mut) {
            UnaryOp::RefMut
        } else {
            op
        };
        let expr = self.parse_unary()?;
        let span = start.merge(expr.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.bump();
                    let field = match self.peek().clone() {
                        TokenKind::Ident(name) => {
                            let token = self.bump();
                            Ident::new(name, token.span)
                        }
                        TokenKind::Int(index) => {
                            let token = self.bump();
                            Ident::new(index.to_string(), token.span)
                        }
                        _ => return Err(self.unexpected("field or method name")),
                    };
                    if self.check(&TokenKind::LParen) {
                        let args = self.parse_call_args()?;
                        let span = expr.span.merge(self.prev_span());
                        expr = Expr::new(
                            ExprKind::MethodCall {
                                receiver: Box::new(expr),
                                method: field,
                                args,
                            },
                            span,
                        );
                    } else {
                        let span = expr.span.merge(field.span);
                        expr = Expr::new(
                            ExprKind::Field {
                                base: Box::new(expr),
                                field,
                            },
                            span,
                        );
                    }
                }
                TokenKind::LParen => {
                    let args = self.parse_call_args()?;
                    let span = expr.span.merge(self.prev_span());
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_call_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        self.parse_expr_list(&TokenKind::RParen)
    }

    /// Comma separated expressions up to and including `close`.
    fn parse_expr_list(&mut self, close: &TokenKind) -> PResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.check(close) {
            items.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let start = self.current_span();
        match self.peek().clone() {
            TokenKind::Int(value) => {
                self.bump();
                Ok(Expr::new(ExprKind::Lit(Lit::Int(value)), start))
            }
            TokenKind::Str(value) => {
                self.bump();
                Ok(Expr::new(ExprKind::Lit(Lit::Str(value)), start))
            }
            TokenKind::True | TokenKind::False => {
                let value = self.check(&TokenKind::True);
                self.bump();
                Ok(Expr::new(ExprKind::Lit(Lit::Bool(value)), start))
            }
            TokenKind::SelfValue => {
                self.bump();
                Ok(Expr::ident(Ident::new("self", start)))
            }
            TokenKind::Ident(name) => {
                self.bump();
                let ident = Ident::new(name, start);
                match (self.peek(), self.peek_at(1)) {
                    (TokenKind::Bang, TokenKind::LParen) | (TokenKind::Bang, TokenKind::LBracket) => {
                        self.parse_macro(ident)
                    }
                    (TokenKind::ColonColon, _) => self.parse_item_path(ident),
                    _ => Ok(Expr::ident(ident)),
                }
            }
            TokenKind::LParen => {
                self.bump();
                if self.eat(&TokenKind::RParen) {
                    return Ok(Expr::new(ExprKind::Tuple(Vec::new()), start.merge(self.prev_span())));
                }
                let first = self.parse_expr()?;
                if self.eat(&TokenKind::RParen) {
                    let span = start.merge(self.prev_span());
                    return Ok(Expr::new(ExprKind::Paren(Box::new(first)), span));
                }
                self.expect(&TokenKind::Comma)?;
                let mut elems = vec![first];
                elems.extend(self.parse_expr_list(&TokenKind::RParen)?);
                let span = start.merge(self.prev_span());
                Ok(Expr::new(ExprKind::Tuple(elems), span))
            }
            TokenKind::LBrace => {
                let block = self.parse_block()?;
                let span = block.span;
                Ok(Expr::new(ExprKind::Block(block), span))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => {
                self.bump();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                let span = start.merge(body.span);
                Ok(Expr::new(
                    ExprKind::While {
                        cond: Box::new(cond),
                        body,
                    },
                    span,
                ))
            }
            TokenKind::For => {
                self.bump();
                let binding = self.expect_ident()?;
                self.expect(&TokenKind::In)?;
                let iter = self.parse_expr()?;
                let body = self.parse_block()?;
                let span = start.merge(body.span);
                Ok(Expr::new(
                    ExprKind::For {
                        binding,
                        iter: Box::new(iter),
                        body,
                    },
                    span,
                ))
            }
            TokenKind::LBracket => self.parse_clause_closure(),
            TokenKind::Move | TokenKind::Pipe | TokenKind::PipePipe => {
                self.parse_closure_tail(ClauseState::Absent, start)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_macro(&mut self, name: Ident) -> PResult<Expr> {
        self.expect(&TokenKind::Bang)?;
        let (delim, close) = if self.eat(&TokenKind::LParen) {
            (MacroDelim::Paren, TokenKind::RParen)
        } else {
            self.expect(&TokenKind::LBracket)?;
            (MacroDelim::Bracket, TokenKind::RBracket)
        };
        let args = self.parse_expr_list(&close)?;
        let span = name.span.merge(self.prev_span());
        Ok(Expr::new(ExprKind::Macro { name, delim, args }, span))
    }

    fn parse_item_path(&mut self, first: Ident) -> PResult<Expr> {
        let mut segments = vec![first];
        while self.eat(&TokenKind::ColonColon) {
            segments.push(self.expect_ident()?);
        }
        let span = segments[0].span.merge(self.prev_span());
        Ok(Expr::new(ExprKind::Path(segments), span))
    }

    fn parse_if(&mut self) -> PResult<Expr> {
        let start = self.expect(&TokenKind::If)?.span;
        let cond = self.parse_expr()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(Box::new(self.parse_if()?))
            } else {
                let block = self.parse_block()?;
                let span = block.span;
                Some(Box::new(Expr::new(ExprKind::Block(block), span)))
            }
        } else {
            None
        };
        let end = else_branch
            .as_ref()
            .map(|e| e.span)
            .unwrap_or(then_branch.span);
        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then_branch,
                else_branch,
            },
            start.merge(end),
        ))
    }

    pub(crate) fn parse_block(&mut self) -> PResult<Block> {
        let start = self.expect(&TokenKind::LBrace)?.span;
        let mut stmts = Vec::new();
        let mut tail = None;

        loop {
            if self.eat(&TokenKind::Semi) {
                continue;
            }
            if self.check(&TokenKind::RBrace) {
                break;
            }
            if self.check(&TokenKind::Let) {
                stmts.push(Stmt::Let(self.parse_local()?));
                continue;
            }
            let expr = self.parse_expr()?;
            if self.eat(&TokenKind::Semi) {
                stmts.push(Stmt::Semi(expr));
            } else if self.check(&TokenKind::RBrace) {
                tail = Some(Box::new(expr));
                break;
            } else if expr.is_block_like() {
                stmts.push(Stmt::Expr(expr));
            } else {
                return Err(self.unexpected("`;` or `}`"));
            }
        }

        let end = self.expect(&TokenKind::RBrace)?.span;
        Ok(Block {
            stmts,
            tail,
            span: start.merge(end),
        })
    }

    fn parse_local(&mut self) -> PResult<Local> {
        let start = self.expect(&TokenKind::Let)?.span;
        let mutable = self.eat(&TokenKind::Mut);
        let name = self.expect_ident()?;
        let ty = if self.eat(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.eat(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end = self.expect(&TokenKind::Semi)?.span;
        Ok(Local {
            mutable,
            name,
            ty,
            init,
            span: start.merge(end),
        })
    }

    // ===== Closures =====

    /// Index of the token closing the delimiter opened at `open`.
    fn matching_close(&self, open: usize) -> PResult<usize> {
        let mut stack: Vec<TokenKind> = Vec::new();
        for (idx, token) in self.tokens.iter().enumerate().skip(open) {
            match &token.kind {
                TokenKind::LBracket => stack.push(TokenKind::RBracket),
                TokenKind::LParen => stack.push(TokenKind::RParen),
                TokenKind::LBrace => stack.push(TokenKind::RBrace),
                kind @ (TokenKind::RBracket | TokenKind::RParen | TokenKind::RBrace) => {
                    if stack.pop().as_ref() != Some(kind) {
                        return Err(SyntaxError::new(
                            format!("mismatched closing delimiter {}", kind.describe()),
                            token.span,
                        ));
                    }
                    if stack.is_empty() {
                        return Ok(idx);
                    }
                }
                TokenKind::Eof => break,
                _ => {}
            }
        }
        Err(SyntaxError::new(
            "unclosed capture clause",
            self.tokens[open].span,
        ))
    }

    fn parse_clause_closure(&mut self) -> PResult<Expr> {
        let open = self.pos;
        let close = self.matching_close(open)?;
        let clause_span = self.tokens[open].span.merge(self.tokens[close].span);
        let inner = self.tokens[open + 1..close].to_vec();

        let clause = match clause::parse_entries(
            inner,
            self.tokens[close].span,
            clause_span,
            self.source,
        ) {
            Ok(clause) => {
                log::trace!(
                    "parsed capture clause with {} entries",
                    clause.entries.len()
                );
                ClauseState::Parsed(clause)
            }
            Err(errors) => {
                log::debug!("capture clause is invalid ({} errors)", errors.len());
                ClauseState::Invalid {
                    text: self.slice(clause_span).to_string(),
                    span: clause_span,
                    errors,
                }
            }
        };

        while self.pos <= close {
            self.bump();
        }
        if !matches!(
            self.peek(),
            TokenKind::Move | TokenKind::Pipe | TokenKind::PipePipe
        ) {
            return Err(self.unexpected("closure after capture clause"));
        }
        self.parse_closure_tail(clause, clause_span)
    }

    fn parse_closure_tail(&mut self, clause: ClauseState, start: Span) -> PResult<Expr> {
        let is_move = self.eat(&TokenKind::Move);
        let mut params = Vec::new();
        if !self.eat(&TokenKind::PipePipe) {
            self.expect(&TokenKind::Pipe)?;
            while !self.check(&TokenKind::Pipe) {
                let mutable = self.eat(&TokenKind::Mut);
                let name = self.expect_ident()?;
                let ty = if self.eat(&TokenKind::Colon) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                params.push(Param { mutable, name, ty });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Pipe)?;
        }
        let body = self.parse_expr()?;
        let span = start.merge(body.span);
        Ok(Expr::new(
            ExprKind::Closure(Closure {
                clause,
                is_move,
                params,
                body: Box::new(body),
                span,
            }),
            span,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use grasp_diagnostics::FileId;

    fn expr(source: &str) -> Expr {
        let tokens = lex(source, FileId(0)).unwrap();
        let mut parser = Parser::new(tokens, source);
        let expr = parser.parse_expr().unwrap();
        assert!(parser.at_eof(), "trailing input in {:?}", source);
        expr
    }

    fn closure(source: &str) -> Closure {
        match expr(source).kind {
            ExprKind::Closure(c) => c,
            other => panic!("expected closure, got {:?}", other),
        }
    }

    fn error(source: &str) -> SyntaxError {
        let tokens = lex(source, FileId(0)).unwrap();
        Parser::new(tokens, source).parse_fragment().unwrap_err()
    }

    #[test]
    fn test_precedence() {
        let e = expr("a + b * c == d");
        let ExprKind::Binary { op, lhs, .. } = e.kind else {
            panic!("expected binary")
        };
        assert_eq!(op, BinOp::Eq);
        assert!(matches!(lhs.kind, ExprKind::Binary { op: BinOp::Add, .. }));
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let e = expr("a = b += 1");
        let ExprKind::Assign { op, value, .. } = e.kind else {
            panic!("expected assignment")
        };
        assert_eq!(op, AssignOp::Assign);
        assert!(matches!(
            value.kind,
            ExprKind::Assign {
                op: AssignOp::AddAssign,
                ..
            }
        ));
    }

    #[test]
    fn test_postfix_chain() {
        let e = expr("self.some_a.something(1).0");
        let ExprKind::Field { base, field } = e.kind else {
            panic!("expected field")
        };
        assert_eq!(field.name, "0");
        assert!(matches!(base.kind, ExprKind::MethodCall { .. }));
    }

    #[test]
    fn test_legacy_closure() {
        let c = closure("move |a, mut b: u32| a + b");
        assert_eq!(c.clause, ClauseState::Absent);
        assert!(c.is_move);
        assert_eq!(c.params.len(), 2);
        assert!(c.params[1].mutable);
        assert_eq!(c.params[1].ty, Some(Type::named("u32")));
    }

    #[test]
    fn test_clause_closure() {
        let c = closure("[&my_vec, +my_arc] || my_vec.len()");
        let ClauseState::Parsed(clause) = c.clause else {
            panic!("expected parsed clause")
        };
        assert_eq!(clause.entries.len(), 2);
        assert_eq!(clause.span, Span::new(FileId(0), 0, 18));
        assert_eq!(c.span.start, 0);
    }

    #[test]
    fn test_invalid_clause_is_recovered() {
        let c = closure("[&mut x] || x");
        let ClauseState::Invalid { text, errors, .. } = c.clause else {
            panic!("expected invalid clause")
        };
        assert_eq!(text, "[&mut x]");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_nested_clause_closure() {
        let c = closure("[&v] || [] move || 5");
        assert!(matches!(c.body.kind, ExprKind::Closure(_)));
    }

    #[test]
    fn test_block_statements() {
        let e = expr("{ let mut n = 0; for x in v { n += x; } if n > 3 { n } else { 0 } }");
        let ExprKind::Block(block) = e.kind else {
            panic!("expected block")
        };
        assert_eq!(block.stmts.len(), 2);
        assert!(matches!(block.stmts[1], Stmt::Expr(_)));
        assert!(block.tail.is_some());
    }

    #[test]
    fn test_macros_and_paths() {
        let e = expr("Clone::clone(&vec![1, 2])");
        let ExprKind::Call { callee, args } = e.kind else {
            panic!("expected call")
        };
        assert!(matches!(callee.kind, ExprKind::Path(ref segs) if segs.len() == 2));
        assert!(matches!(
            args[0].kind,
            ExprKind::Unary {
                op: UnaryOp::Ref,
                ..
            }
        ));
    }

    #[test]
    fn test_double_reference() {
        let e = expr("&&x");
        let ExprKind::Unary { op, expr: inner } = e.kind else {
            panic!("expected unary")
        };
        assert_eq!(op, UnaryOp::Ref);
        assert!(matches!(
            inner.kind,
            ExprKind::Unary {
                op: UnaryOp::Ref,
                ..
            }
        ));
    }

    #[test]
    fn test_fragment_headers() {
        let source = "struct Counter { count: u32, label: String, }\nimpl Counter;\nlet my_vec: Vec<u8>;\n[+self.*] || self.count";
        let tokens = lex(source, FileId(0)).unwrap();
        let fragment = Parser::new(tokens, source).parse_fragment().unwrap();
        assert_eq!(fragment.structs.len(), 1);
        assert_eq!(fragment.structs[0].fields.len(), 2);
        assert_eq!(fragment.impl_ty, Some(Type::named("Counter")));
        assert_eq!(fragment.bindings[0].ty.to_string(), "Vec<u8>");
    }

    #[test]
    fn test_types() {
        let source = "&mut std::collections::HashMap<String, (u8, &&T)>";
        let tokens = lex(source, FileId(0)).unwrap();
        let ty = Parser::new(tokens, source).parse_type().unwrap();
        assert_eq!(ty.to_string(), "&mut std::collections::HashMap<String, (u8, &&T)>");
    }

    #[test]
    fn test_unclosed_clause() {
        let err = error("[a, b || a");
        assert_eq!(err.message, "unclosed capture clause");
    }

    #[test]
    fn test_clause_without_closure() {
        let err = error("[a] a");
        assert_eq!(
            err.message,
            "expected closure after capture clause, found identifier `a`"
        );
    }

    #[test]
    fn test_missing_semicolon() {
        let err = error("{ a b }");
        assert_eq!(err.message, "expected `;` or `}`, found identifier `b`");
    }
}
