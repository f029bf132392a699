//! Template intermediate representation.
//!
//! The scanner turns template source into a flat, ordered list of [`Node`]s.
//! Literal text is stored decoded; escaping only happens when the program
//! is rendered as text (see the [`Display`](fmt::Display) impls).

use crate::Span;
use std::fmt;

/// Name of the output accumulator in the textual program form.
pub const ACCUMULATOR: &str = "_result";

/// One statement of a scanned template.
///
/// For tags, `span` covers the fragment between the markers and the close
/// delimiter, so fragment tokens can be positioned inside the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// What a [`Node`] does when the template runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Append this text to the output.
    Literal(String),
    /// Run this fragment verbatim (`<% ... %>`).
    Code(String),
    /// Evaluate the fragment and print it escaped (`<%= ... %>`).
    Print(String),
    /// Render another template and splice it in (`<%# ... %>`).
    Include(String),
}

/// A scanned template: the "program text" stored in the cache.
///
/// Immutable once produced; a refresh replaces the whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub nodes: Vec<Node>,
}

impl Template {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The complete executable unit as text, as returned in raw mode.
    ///
    /// `include_base` is the directory includes are resolved against.
    pub fn assembled_text(&self, include_base: &str) -> String {
        format!(
            "var {ACCUMULATOR}='',include=bind_include('{}'),print=escape_print;\n{self};\nreturn {ACCUMULATOR}",
            escape_literal(include_base)
        )
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{node}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Literal(text) => write!(f, "{ACCUMULATOR}+='{}';", escape_literal(text)),
            NodeKind::Code(src) => writeln!(f, "{src}"),
            NodeKind::Print(src) => writeln!(f, "print({src})"),
            NodeKind::Include(src) => writeln!(f, "include({src})"),
        }
    }
}

/// Escape text so it can sit inside a single-quoted string literal.
pub fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: NodeKind) -> Node {
        Node::new(kind, Span::default())
    }

    #[test]
    fn test_literal_display_escapes_quotes_and_breaks() {
        let n = node(NodeKind::Literal("it's\na \\ b".into()));
        assert_eq!(n.to_string(), "_result+='it\\'s\\na \\\\ b';");
    }

    #[test]
    fn test_program_text_in_source_order() {
        let t = Template::new(vec![
            node(NodeKind::Literal("Hello ".into())),
            node(NodeKind::Print(" name ".into())),
            node(NodeKind::Code(" if (x) { ".into())),
            node(NodeKind::Include(" 'b' ".into())),
        ]);
        assert_eq!(
            t.to_string(),
            "_result+='Hello ';print( name )\n if (x) { \ninclude( 'b' )\n"
        );
    }

    #[test]
    fn test_assembled_text_wraps_program() {
        let t = Template::new(vec![node(NodeKind::Literal("x".into()))]);
        let text = t.assembled_text("views");
        assert!(text.starts_with("var _result='',include=bind_include('views')"));
        assert!(text.contains("_result+='x';"));
        assert!(text.ends_with("return _result"));
    }
}
