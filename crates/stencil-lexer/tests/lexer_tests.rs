//! Fragment lexer tests.
//!
//! Covers keywords and their aliases, operators (including the folded
//! strict-equality forms), literals, comments, error reporting and the
//! 100-iteration determinism test.

use stencil_lexer::{Lexer, TokenKind, ALL_KEYWORDS};
use stencil_types::{EvalError, Span};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

/// Lex fragment text and return just the token kinds.
fn kinds(source: &str) -> Vec<TokenKind> {
    Lexer::new(source)
        .lex()
        .expect("fragment should lex")
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

/// Lex fragment text and return the error message.
fn error_message(source: &str) -> String {
    match Lexer::new(source).lex() {
        Err(EvalError::Syntax { message, .. }) => message,
        Err(other) => panic!("expected syntax error, got {other:?}"),
        Ok(tokens) => panic!("expected error, got {tokens:?}"),
    }
}

fn ident(name: &str) -> TokenKind {
    TokenKind::Identifier(name.to_string())
}

// ─────────────────────────────────────────────────────────────────────
// Keywords
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_every_keyword_is_recognized() {
    for keyword in ALL_KEYWORDS {
        let lexed = kinds(keyword);
        assert_eq!(lexed.len(), 1, "{keyword}");
        assert!(
            !matches!(lexed[0], TokenKind::Identifier(_)),
            "{keyword} lexed as identifier"
        );
    }
}

#[test]
fn test_declaration_keywords_share_one_token() {
    assert_eq!(
        kinds("let const var"),
        vec![TokenKind::Let, TokenKind::Let, TokenKind::Let]
    );
}

#[test]
fn test_undefined_is_null() {
    assert_eq!(kinds("undefined null"), vec![TokenKind::Null, TokenKind::Null]);
}

#[test]
fn test_keyword_prefix_is_identifier() {
    assert_eq!(
        kinds("letter iffy format"),
        vec![ident("letter"), ident("iffy"), ident("format")]
    );
}

#[test]
fn test_identifiers_allow_dollar_and_underscore() {
    assert_eq!(
        kinds("$el _result a1"),
        vec![ident("$el"), ident("_result"), ident("a1")]
    );
}

// ─────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_arithmetic_operators() {
    assert_eq!(
        kinds("+ - * / %"),
        vec![
            TokenKind::Plus,
            TokenKind::Minus,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Percent,
        ]
    );
}

#[test]
fn test_assignment_operators() {
    assert_eq!(
        kinds("a = 1; a += 2"),
        vec![
            ident("a"),
            TokenKind::Eq,
            TokenKind::NumberLit(1.0),
            TokenKind::Semicolon,
            ident("a"),
            TokenKind::PlusEq,
            TokenKind::NumberLit(2.0),
        ]
    );
}

#[test]
fn test_strict_equality_folds_into_loose() {
    assert_eq!(
        kinds("== === != !=="),
        vec![
            TokenKind::EqEq,
            TokenKind::EqEq,
            TokenKind::BangEq,
            TokenKind::BangEq,
        ]
    );
}

#[test]
fn test_comparison_and_logic() {
    assert_eq!(
        kinds("< <= > >= && || ! ?"),
        vec![
            TokenKind::Less,
            TokenKind::LessEq,
            TokenKind::Greater,
            TokenKind::GreaterEq,
            TokenKind::AndAnd,
            TokenKind::OrOr,
            TokenKind::Bang,
            TokenKind::Question,
        ]
    );
}

#[test]
fn test_punctuation() {
    assert_eq!(
        kinds("( ) { } [ ] , : ; ."),
        vec![
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::RBrace,
            TokenKind::LBracket,
            TokenKind::RBracket,
            TokenKind::Comma,
            TokenKind::Colon,
            TokenKind::Semicolon,
            TokenKind::Dot,
        ]
    );
}

#[test]
fn test_single_ampersand_is_rejected() {
    assert!(error_message("a & b").contains("unexpected character '&'"));
}

// ─────────────────────────────────────────────────────────────────────
// Literals
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_numbers() {
    assert_eq!(
        kinds("0 42 3.25"),
        vec![
            TokenKind::NumberLit(0.0),
            TokenKind::NumberLit(42.0),
            TokenKind::NumberLit(3.25),
        ]
    );
}

#[test]
fn test_exponent_numbers() {
    assert_eq!(
        kinds("1e3 2.5E-2 4e+1"),
        vec![
            TokenKind::NumberLit(1000.0),
            TokenKind::NumberLit(0.025),
            TokenKind::NumberLit(40.0),
        ]
    );
}

#[test]
fn test_exponent_needs_digits() {
    assert_eq!(
        kinds("2em"),
        vec![TokenKind::NumberLit(2.0), ident("em")]
    );
}

#[test]
fn test_number_followed_by_member_access() {
    assert_eq!(
        kinds("1.x"),
        vec![TokenKind::NumberLit(1.0), TokenKind::Dot, ident("x")]
    );
}

#[test]
fn test_strings_with_both_quotes() {
    assert_eq!(
        kinds(r#"'single' "double""#),
        vec![
            TokenKind::StringLit("single".into()),
            TokenKind::StringLit("double".into()),
        ]
    );
}

#[test]
fn test_string_escapes_are_decoded() {
    assert_eq!(
        kinds(r#""a\"b\n\t\\""#),
        vec![TokenKind::StringLit("a\"b\n\t\\".into())]
    );
}

#[test]
fn test_string_may_contain_close_delimiter() {
    assert_eq!(
        kinds("'%>'"),
        vec![TokenKind::StringLit("%>".into())]
    );
}

#[test]
fn test_unterminated_string() {
    assert_eq!(error_message("'abc"), "unterminated string literal");
    assert_eq!(error_message("'abc\\"), "unterminated string literal");
}

// ─────────────────────────────────────────────────────────────────────
// Comments and whitespace
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_line_comment_is_skipped() {
    assert_eq!(kinds("a // rest\nb"), vec![ident("a"), ident("b")]);
}

#[test]
fn test_block_comment_is_skipped() {
    assert_eq!(kinds("a /* x\ny */ b"), vec![ident("a"), ident("b")]);
}

#[test]
fn test_unterminated_block_comment() {
    assert_eq!(error_message("a /* b"), "unterminated block comment");
}

#[test]
fn test_empty_fragment() {
    assert!(kinds("").is_empty());
    assert!(kinds("  \n\t ").is_empty());
}

// ─────────────────────────────────────────────────────────────────────
// Spans
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_error_span_is_in_template_coordinates() {
    let err = Lexer::at("x @", Span::point(4, 7)).lex().unwrap_err();
    let EvalError::Syntax { span, .. } = err else {
        panic!("expected syntax error");
    };
    assert_eq!(span.start_line, 4);
    assert_eq!(span.start_col, 9);
}

#[test]
fn test_token_spans_cover_lexeme() {
    let tokens = Lexer::new("foo + 'bar'").lex().unwrap();
    assert_eq!(tokens[0].span, Span::new(1, 1, 1, 3));
    assert_eq!(tokens[1].span, Span::new(1, 5, 1, 5));
    assert_eq!(tokens[2].span, Span::new(1, 7, 1, 11));
}

// ─────────────────────────────────────────────────────────────────────
// Determinism
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_lexing_is_deterministic_100_iterations() {
    let source = "for (let item of items) { if (item.n >= 2 && !item.off) { print(item.name); } }";
    let first = Lexer::new(source).lex().unwrap();
    for _ in 0..100 {
        assert_eq!(Lexer::new(source).lex().unwrap(), first);
    }
}
