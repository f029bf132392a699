//! Shared types for the Stencil template compiler.
//!
//! This crate defines the template IR produced by the scanner, the AST of
//! embedded code fragments, source spans, and the error types used across
//! all pipeline stages.

mod error;
mod span;
pub mod ast;
pub mod ir;

pub use error::{EvalError, SyntaxError, TemplateError};
pub use ir::{Node, NodeKind, Template};
pub use span::{SourceFile, Span};

/// Values bound into templates.
pub use serde_json::Value;

/// A name → value mapping used for globals and per-render imports.
pub type Bindings = serde_json::Map<String, Value>;

/// Result type used throughout the Stencil pipeline.
pub type Result<T> = std::result::Result<T, TemplateError>;
