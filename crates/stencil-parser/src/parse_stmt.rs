//! Statement parsing.
//!
//! ```text
//! Stmt     = Emit | LetStmt | AssignStmt | IfStmt | ForStmt | Expr
//! LetStmt  = ("let" | "const" | "var") Ident "=" Expr
//! Assign   = Ident ("=" | "+=") Expr
//! IfStmt   = "if" Expr Block [ "else" ( IfStmt | Block ) ]
//! ForStmt  = "for" "(" ["let"] Ident ("of" | "in") Expr ")" Block
//! Block    = "{" { Stmt | ";" } "}"
//! ```
//!
//! A block may span several code tags; literal text between them arrives as
//! `Emit` tokens and becomes part of the block body.

use stencil_lexer::TokenKind;
use stencil_types::ast::*;

use crate::parser::{ParseResult, Parser};

impl Parser {
    /// Parse a single statement.
    pub(crate) fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.peek_kind().clone() {
            TokenKind::Emit(text) => {
                let span = self.advance().span;
                Ok(Stmt::new(StmtKind::Emit(text), span))
            }
            TokenKind::Let => self.parse_let(),
            TokenKind::If => {
                let start = self.current_span();
                let stmt = self.parse_if()?;
                Ok(Stmt::new(StmtKind::If(stmt), start.merge(self.previous_span())))
            }
            TokenKind::For => self.parse_for(),
            TokenKind::Identifier(_)
                if matches!(self.look_ahead(1), TokenKind::Eq | TokenKind::PlusEq) =>
            {
                self.parse_assign()
            }
            _ => {
                let expr = self.parse_expression()?;
                let span = expr.span;
                Ok(Stmt::new(StmtKind::Expr(expr), span))
            }
        }
    }

    fn parse_let(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::Eq)?;
        let value = self.parse_expression()?;
        let span = start.merge(value.span);
        Ok(Stmt::new(StmtKind::Let { name, value }, span))
    }

    fn parse_assign(&mut self) -> ParseResult<Stmt> {
        let name = self.expect_identifier()?;
        let op = match self.advance().kind {
            TokenKind::PlusEq => AssignOp::Add,
            _ => AssignOp::Set,
        };
        let value = self.parse_expression()?;
        let span = name.span.merge(value.span);
        Ok(Stmt::new(StmtKind::Assign { name, op, value }, span))
    }

    fn parse_if(&mut self) -> ParseResult<IfStmt> {
        self.expect(&TokenKind::If)?;
        let condition = self.parse_expression()?;
        let then_body = self.parse_block()?;

        let else_branch = if self.eat_else() {
            if self.check_exact(&TokenKind::If) {
                Some(ElseBranch::ElseIf(Box::new(self.parse_if()?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };

        Ok(IfStmt {
            condition,
            then_body,
            else_branch,
        })
    }

    /// Consume `else`, allowing tag boundaries (`;`) before it.
    fn eat_else(&mut self) -> bool {
        let mut n = 0;
        while self.look_ahead(n) == &TokenKind::Semicolon {
            n += 1;
        }
        if self.look_ahead(n) != &TokenKind::Else {
            return false;
        }
        for _ in 0..=n {
            self.advance();
        }
        true
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let start = self.advance().span;
        self.expect(&TokenKind::LParen)?;
        self.eat(&TokenKind::Let);
        let binding = self.expect_identifier()?;
        let kind = match self.peek_kind() {
            TokenKind::Of => ForKind::Of,
            TokenKind::In => ForKind::In,
            other => {
                return Err(
                    self.error_at_current(format!("expected 'of' or 'in', got '{other}'"))
                )
            }
        };
        self.advance();
        let iterable = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        let span = start.merge(self.previous_span());
        Ok(Stmt::new(
            StmtKind::For(ForStmt {
                binding,
                kind,
                iterable,
                body,
            }),
            span,
        ))
    }

    /// Parse `{ stmt* }`.
    pub(crate) fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        let open = self.expect(&TokenKind::LBrace)?;
        self.enter()?;
        let mut body = Vec::new();
        loop {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            if self.at_end() {
                return Err(self.error_at(open.span, "unclosed block: missing '}'"));
            }
            body.push(self.parse_statement()?);
        }
        self.leave();
        Ok(body)
    }
}
