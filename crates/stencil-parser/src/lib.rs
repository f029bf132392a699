//! Stencil parser.
//!
//! Two entry points:
//! - [`scan_template`]: raw template text → [`Template`](stencil_types::Template)
//!   (literal, code, print and include nodes; fragments stay opaque text)
//! - [`Parser`]: an assembled token stream → fragment [`Program`](stencil_types::ast::Program)

mod parse_expr;
mod parse_stmt;
mod parser;
mod template;

pub use parser::{ParseResult, Parser, MAX_NESTING};
pub use template::{scan_template, UNTERMINATED_TAG};
