//! Code-fragment lexer: converts the text of one code tag into tokens.
//!
//! Features:
//! - JavaScript-flavoured operators (`===` and `!==` fold into `==`/`!=`)
//! - `'...'` and `"..."` strings with backslash escapes
//! - `//` line comments and `/* */` block comments are skipped
//! - Spans are reported in template coordinates, not fragment coordinates
//!
//! Lexing stops at the first error: a fragment is small and a later error
//! would only repeat the first one.

use stencil_types::{EvalError, Span};

use crate::token::{Token, TokenKind};

/// Result of lexing one fragment.
pub type LexResult = Result<Vec<Token>, EvalError>;

/// The fragment lexer.
pub struct Lexer {
    /// The fragment text.
    chars: Vec<char>,
    /// Current index into `chars`.
    pos: usize,
    /// Current line number (1-based, template coordinates).
    line: u32,
    /// Current column number (1-based, template coordinates).
    col: u32,
}

impl Lexer {
    /// Create a lexer for a fragment starting at line 1, column 1.
    pub fn new(source: &str) -> Self {
        Self::at(source, Span::point(1, 1))
    }

    /// Create a lexer for a fragment whose first character sits at `start`.
    pub fn at(source: &str, start: Span) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: start.start_line,
            col: start.start_col,
        }
    }

    /// Lex the whole fragment. The token stream does NOT end with `Eof`;
    /// fragments are spliced into a larger stream by the assembler.
    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.at_end() {
                return Ok(tokens);
            }
            tokens.push(self.scan_token()?);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        match ch {
            '\r' if self.peek() == Some('\n') => self.col += 1,
            '\n' | '\r' | '\u{2028}' | '\u{2029}' => {
                self.line += 1;
                self.col = 1;
            }
            _ => self.col += 1,
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn span_from(&self, start_line: u32, start_col: u32) -> Span {
        Span::new(start_line, start_col, self.line, self.col.saturating_sub(1).max(1))
    }

    fn error(&self, message: impl Into<String>, span: Span) -> EvalError {
        EvalError::Syntax {
            message: message.into(),
            span,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    fn skip_trivia(&mut self) -> Result<(), EvalError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(ch), _) if ch.is_whitespace() => {
                    self.advance();
                }
                (Some('/'), Some('/')) => {
                    while let Some(ch) = self.peek() {
                        if matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}') {
                            break;
                        }
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    let (line, col) = (self.line, self.col);
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => {
                                return Err(self.error(
                                    "unterminated block comment",
                                    self.span_from(line, col),
                                ))
                            }
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Token scanning
    // ─────────────────────────────────────────────────────────────

    fn scan_token(&mut self) -> Result<Token, EvalError> {
        let (line, col) = (self.line, self.col);
        let Some(ch) = self.advance() else {
            return Ok(Token::new(TokenKind::Eof, Span::point(line, col)));
        };

        let kind = match ch {
            '\'' | '"' => return self.scan_string(ch, line, col),
            '0'..='9' => return self.scan_number(line, col),
            c if is_ident_start(c) => return Ok(self.scan_identifier(line, col)),

            '+' => {
                if self.eat('=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => {
                if self.eat('=') {
                    self.eat('=');
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.eat('=') {
                    self.eat('=');
                    TokenKind::BangEq
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::LessEq
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::GreaterEq
                } else {
                    TokenKind::Greater
                }
            }
            '&' if self.eat('&') => TokenKind::AndAnd,
            '|' if self.eat('|') => TokenKind::OrOr,
            '?' => TokenKind::Question,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            other => {
                return Err(self.error(
                    format!("unexpected character '{other}'"),
                    self.span_from(line, col),
                ))
            }
        };
        Ok(Token::new(kind, self.span_from(line, col)))
    }

    fn scan_string(&mut self, quote: char, line: u32, col: u32) -> Result<Token, EvalError> {
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(self.error("unterminated string literal", self.span_from(line, col)))
                }
                Some(c) if c == quote => break,
                Some('\\') => {
                    let Some(escaped) = self.advance() else {
                        return Err(
                            self.error("unterminated string literal", self.span_from(line, col))
                        );
                    };
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                Some(c) => value.push(c),
            }
        }
        Ok(Token::new(
            TokenKind::StringLit(value),
            self.span_from(line, col),
        ))
    }

    fn scan_number(&mut self, line: u32, col: u32) -> Result<Token, EvalError> {
        let start = self.pos - 1;
        while matches!(self.peek(), Some('0'..='9')) {
            self.advance();
        }
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some('0'..='9')) {
            self.advance();
            while matches!(self.peek(), Some('0'..='9')) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let digits_at = match self.peek_at(1) {
                Some('+' | '-') => 2,
                _ => 1,
            };
            if matches!(self.peek_at(digits_at), Some('0'..='9')) {
                for _ in 0..digits_at {
                    self.advance();
                }
                while matches!(self.peek(), Some('0'..='9')) {
                    self.advance();
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let span = self.span_from(line, col);
        text.parse::<f64>()
            .map(|n| Token::new(TokenKind::NumberLit(n), span))
            .map_err(|_| self.error(format!("invalid number literal '{text}'"), span))
    }

    fn scan_identifier(&mut self, line: u32, col: u32) -> Token {
        let start = self.pos - 1;
        while self.peek().is_some_and(is_ident_continue) {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let kind = TokenKind::from_keyword(&text).unwrap_or(TokenKind::Identifier(text));
        Token::new(kind, self.span_from(line, col))
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_use_template_coordinates() {
        let tokens = Lexer::at(" name", Span::point(3, 10)).lex().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].span, Span::new(3, 11, 3, 14));
    }

    #[test]
    fn test_spans_follow_line_breaks() {
        let tokens = Lexer::new("a\r\n  b").lex().unwrap();
        assert_eq!(tokens[1].span.start_line, 2);
        assert_eq!(tokens[1].span.start_col, 3);
    }
}
