//! Code assembler: scanned template → executable [`Program`].
//!
//! Every node becomes part of one token stream:
//!
//! ```text
//! Literal(t)  →  Emit(t)
//! Code(f)     →  tokens(f) ;
//! Print(f)    →  print ( tokens(f) ) ;
//! Include(f)  →  include ( tokens(f) ) ;
//! ```
//!
//! The stream is then parsed as a whole, which lets a block opened in one
//! code tag close in a later one. Fragments are only looked at here, at
//! render time; the scanner treats them as opaque text.

use crate::error::EvalResult;
use stencil_lexer::{Lexer, Token, TokenKind};
use stencil_parser::Parser;
use stencil_types::ast::Program;
use stencil_types::{NodeKind, Span, Template};

/// Name of the print builtin.
pub const PRINT: &str = "print";
/// Name of the include builtin.
pub const INCLUDE: &str = "include";

/// Assemble a scanned template into a program.
pub fn assemble(template: &Template) -> EvalResult<Program> {
    let mut tokens = Vec::new();
    for node in &template.nodes {
        match &node.kind {
            NodeKind::Literal(text) => {
                tokens.push(Token::new(TokenKind::Emit(text.clone()), node.span));
            }
            NodeKind::Code(fragment) => {
                tokens.extend(Lexer::at(fragment, node.span).lex()?);
                tokens.push(terminator(node.span));
            }
            NodeKind::Print(fragment) => push_call(&mut tokens, PRINT, fragment, node.span)?,
            NodeKind::Include(fragment) => push_call(&mut tokens, INCLUDE, fragment, node.span)?,
        }
    }
    Parser::new(tokens).parse()
}

fn push_call(tokens: &mut Vec<Token>, name: &str, fragment: &str, span: Span) -> EvalResult<()> {
    let start = Span::point(span.start_line, span.start_col);
    tokens.push(Token::new(TokenKind::Identifier(name.to_string()), start));
    tokens.push(Token::new(TokenKind::LParen, start));
    tokens.extend(Lexer::at(fragment, span).lex()?);
    tokens.push(Token::new(TokenKind::RParen, end_of(span)));
    tokens.push(terminator(span));
    Ok(())
}

fn terminator(span: Span) -> Token {
    Token::new(TokenKind::Semicolon, end_of(span))
}

fn end_of(span: Span) -> Span {
    Span::point(span.end_line, span.end_col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_parser::scan_template;
    use stencil_types::ast::{ExprKind, StmtKind};
    use stencil_types::EvalError;

    fn program(source: &str) -> EvalResult<Program> {
        assemble(&scan_template(source, "<%", "%>").unwrap())
    }

    #[test]
    fn test_print_tag_becomes_print_call() {
        let p = program("<%= a, b %>").unwrap();
        assert_eq!(p.body.len(), 1);
        let StmtKind::Expr(expr) = &p.body[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Call { callee, args } = &expr.kind else {
            panic!("expected call");
        };
        assert_eq!(callee.kind, ExprKind::Identifier(PRINT.into()));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_block_spans_tags() {
        let p = program("<% if (x) { %>yes<% } else { %>no<% } %>").unwrap();
        assert_eq!(p.body.len(), 1);
        assert!(matches!(p.body[0].kind, StmtKind::If(_)));
    }

    #[test]
    fn test_unclosed_block_is_reported() {
        let err = program("<% for (x of xs) { %>item").unwrap_err();
        assert!(matches!(err, EvalError::Syntax { .. }));
        assert!(err.to_string().contains("unclosed block"));
    }

    #[test]
    fn test_fragment_error_points_into_template() {
        let err = program("line one\n<% let = 3 %>").unwrap_err();
        let EvalError::Syntax { span, .. } = err else {
            panic!("expected syntax error");
        };
        assert_eq!(span.start_line, 2);
        assert_eq!(span.start_col, 8);
    }
}
