//! Core fragment parser infrastructure: token cursor, error reporting, helpers.

use stencil_lexer::{Token, TokenKind};
use stencil_types::ast::{Ident, Program};
use stencil_types::{EvalError, Span};

/// Maximum nesting of expressions and blocks before parsing gives up.
pub const MAX_NESTING: u32 = 64;

/// Result of parsing: the first error stops the parse.
pub type ParseResult<T> = Result<T, EvalError>;

/// The fragment parser.
///
/// Consumes the token stream assembled from a whole template (literal text
/// included as [`TokenKind::Emit`] tokens) and builds a [`Program`].
pub struct Parser {
    /// The token stream, always ending with `Eof`.
    tokens: Vec<Token>,
    /// Current index into `tokens`.
    pos: usize,
    /// Current expression/block nesting depth.
    pub(crate) depth: u32,
}

impl Parser {
    /// Create a new parser. An `Eof` token is appended when missing.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let span = tokens.last().map(|t| t.span).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, span));
        }
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Parse the whole token stream into a program.
    pub fn parse(mut self) -> ParseResult<Program> {
        let mut body = Vec::new();
        while !self.at_end() {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            if self.check_exact(&TokenKind::RBrace) {
                return Err(self.error_at_current("unexpected '}' without an open block"));
            }
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    /// Returns the current token without advancing.
    pub(crate) fn peek(&self) -> &Token {
        // `new` guarantees a trailing Eof, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    /// Advance the cursor by one and return the consumed token.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    /// Returns the previously consumed token's span.
    pub(crate) fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.peek().span
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check_exact(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// If the current token matches, advance and return `true`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check_exact(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Look ahead by `n` tokens from the current position.
    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    /// Expect a specific token kind.
    pub(crate) fn expect(&mut self, expected: &TokenKind) -> ParseResult<Token> {
        if self.check_exact(expected) {
            Ok(self.advance())
        } else {
            Err(self.error_at_current(format!(
                "expected '{}', got '{}'",
                expected,
                self.peek_kind()
            )))
        }
    }

    /// Expect an identifier token.
    pub(crate) fn expect_identifier(&mut self) -> ParseResult<Ident> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Ok(Ident::new(name, span))
            }
            other => Err(self.error_at_current(format!("expected identifier, got '{other}'"))),
        }
    }

    /// Expect a property name after `.`; reserved words are valid here.
    pub(crate) fn expect_property_name(&mut self) -> ParseResult<Ident> {
        let kind = self.peek_kind().clone();
        match kind {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Ok(Ident::new(name, span))
            }
            TokenKind::Let
            | TokenKind::If
            | TokenKind::Else
            | TokenKind::For
            | TokenKind::Of
            | TokenKind::In
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null => {
                let span = self.advance().span;
                Ok(Ident::new(kind.to_string(), span))
            }
            other => Err(self.error_at_current(format!("expected property name, got '{other}'"))),
        }
    }

    // ── Nesting ───────────────────────────────────────────────────────────────

    pub(crate) fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error_at_current(format!(
                "maximum nesting depth is {MAX_NESTING}"
            )));
        }
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ── Errors ────────────────────────────────────────────────────────────────

    pub(crate) fn error_at(&self, span: Span, message: impl Into<String>) -> EvalError {
        EvalError::Syntax {
            message: message.into(),
            span,
        }
    }

    pub(crate) fn error_at_current(&self, message: impl Into<String>) -> EvalError {
        self.error_at(self.current_span(), message)
    }
}
