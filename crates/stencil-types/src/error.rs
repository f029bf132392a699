use crate::Span;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A template could not be scanned: a code tag was opened but never closed.
///
/// Carries enough context to point at the offending opening delimiter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntaxError {
    /// Template identifier, when the template had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// Location of the opening delimiter.
    #[serde(flatten)]
    pub span: Span,
    /// The source line containing the opening delimiter.
    pub source_line: String,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span, source_line: impl Into<String>) -> Self {
        Self {
            id: None,
            message: message.into(),
            span,
            source_line: source_line.into(),
        }
    }

    /// Attach the identifier of the template being scanned.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{id}:{}: {}", self.span, self.message),
            None => write!(f, "{}: {}", self.span, self.message),
        }
    }
}

impl std::error::Error for SyntaxError {}

/// Runtime failure while executing an assembled template.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A code fragment is outside the fragment grammar, or blocks are unbalanced.
    #[error("{span}: invalid code fragment: {message}")]
    Syntax { message: String, span: Span },

    /// Unknown variable.
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// Assignment to a name that was never bound.
    #[error("assignment to undeclared variable: {0}")]
    UndeclaredAssignment(String),

    /// Operation applied to the wrong kind of value.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Division or modulo by zero.
    #[error("arithmetic trap: {0}")]
    ArithmeticTrap(String),

    /// Property or index access on `null`.
    #[error("null access: {0}")]
    NullAccess(String),

    /// Call of something that is not a known function or method.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments to a builtin.
    #[error("wrong argument count: {0}")]
    ArgumentCount(String),

    /// A value could not be turned into text.
    #[error("cannot serialize value: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A nested `include` failed; the inner error is reported unchanged.
    #[error(transparent)]
    Include(Box<TemplateError>),
}

/// Every failure surfaced by precache and render.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Unterminated code tag.
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// The source resolver could not supply content for a path.
    #[error("can not read source \"{path}\": {source}")]
    SourceRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A fragment, `print` or `include` failed while rendering `id`.
    #[error("execution failed in \"{id}\": {source}")]
    Execution {
        id: String,
        #[source]
        source: EvalError,
    },

    /// The include chain grew past the configured depth.
    #[error("include depth {depth} exceeded while rendering \"{id}\" (cyclic include?)")]
    CyclicInclude { id: String, depth: usize },

    /// The engine configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TemplateError {
    /// Wrap a runtime error raised while rendering `id`.
    ///
    /// Errors coming back from a nested include are unwrapped so the caller
    /// sees the innermost failure (a cyclic include stays `CyclicInclude`).
    pub fn execution(id: impl Into<String>, error: EvalError) -> Self {
        match error {
            EvalError::Include(inner) => *inner,
            source => TemplateError::Execution {
                id: id.into(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display_with_id() {
        let err = SyntaxError::new("unexpected end of template", Span::point(3, 5), "a <% b")
            .with_id("views/page.html");
        assert_eq!(
            err.to_string(),
            "views/page.html:3:5: unexpected end of template"
        );
    }

    #[test]
    fn test_syntax_error_serializes_flat_span() {
        let err = SyntaxError::new("unexpected end of template", Span::point(1, 2), "x<%");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["start_line"], 1);
        assert_eq!(json["start_col"], 2);
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_execution_unwraps_nested_include_error() {
        let inner = TemplateError::CyclicInclude {
            id: "a".into(),
            depth: 4,
        };
        let err = TemplateError::execution("b", EvalError::Include(Box::new(inner)));
        assert!(matches!(err, TemplateError::CyclicInclude { depth: 4, .. }));
    }

    #[test]
    fn test_execution_wraps_runtime_error() {
        let err = TemplateError::execution("page", EvalError::UndefinedVariable("x".into()));
        assert_eq!(
            err.to_string(),
            "execution failed in \"page\": undefined variable: x"
        );
    }
}
