//! Template scanner: turns raw template text into a [`Template`].
//!
//! A single pass over the characters with three states: TEXT, CODE and
//! STRING-IN-CODE. Literal text accumulates in a buffer that is flushed as
//! one [`NodeKind::Literal`] whenever a code tag starts. Spaces and tabs are
//! held back in a pending run until the next character decides their fate:
//!
//! - a line that held only a code or include tag leaves no trace: its
//!   indentation and its line break are dropped;
//! - whitespace right before an expression tag (`<%=`) is kept as its own
//!   literal so inline spacing survives;
//! - whitespace right before any other tag is dropped.
//!
//! Line breaks (`\n`, `\r`, `\r\n`, U+2028, U+2029) are normalized to `\n`.
//! Code fragments are copied verbatim; the scanner only understands quoted
//! strings inside them, so a close delimiter inside `"..."` or `'...'` does
//! not end the tag.

use stencil_types::{Node, NodeKind, SourceFile, Span, SyntaxError, Template};

/// Message used for an opened tag that never closes.
pub const UNTERMINATED_TAG: &str = "unexpected end of template";

/// Scan `content` using the given delimiters.
pub fn scan_template(content: &str, open: &str, close: &str) -> Result<Template, SyntaxError> {
    Scanner::new(content, open, close).scan()
}

/// Which kind of tag the characters after the open delimiter selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Code,
    Print,
    Include,
}

struct Scanner<'src> {
    source: &'src str,
    chars: Vec<char>,
    open: Vec<char>,
    close: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    nodes: Vec<Node>,
    /// Literal text awaiting a flush.
    buffer: String,
    /// Pending run of spaces and tabs.
    whitespace: String,
    /// Where the current text segment began.
    text_start: (u32, u32),
    /// Set by code and include tags, cleared by any visible character.
    after_code: bool,
}

impl<'src> Scanner<'src> {
    fn new(source: &'src str, open: &str, close: &str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            open: open.chars().collect(),
            close: close.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            nodes: Vec::new(),
            buffer: String::new(),
            whitespace: String::new(),
            text_start: (1, 1),
            after_code: false,
        }
    }

    fn scan(mut self) -> Result<Template, SyntaxError> {
        while let Some(ch) = self.peek() {
            if self.at_delimiter(&self.open) {
                self.scan_tag()?;
                continue;
            }
            match ch {
                ' ' | '\t' => {
                    self.whitespace.push(ch);
                    self.advance();
                }
                '\n' | '\r' | '\u{2028}' | '\u{2029}' => {
                    self.advance();
                    self.line_break();
                }
                _ => {
                    self.buffer.push_str(&self.whitespace);
                    self.whitespace.clear();
                    self.after_code = false;
                    self.buffer.push(ch);
                    self.advance();
                }
            }
        }

        if !self.after_code {
            self.buffer.push_str(&self.whitespace);
        }
        self.whitespace.clear();
        self.flush_buffer();
        Ok(Template::new(self.nodes))
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Consume one character. `\r\n` is consumed as a single line break.
    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        match ch {
            '\r' if self.peek() == Some('\n') => {
                self.pos += 1;
                self.new_line();
            }
            '\n' | '\r' | '\u{2028}' | '\u{2029}' => self.new_line(),
            _ => self.col += 1,
        }
        Some(ch)
    }

    fn new_line(&mut self) {
        self.line += 1;
        self.col = 1;
    }

    fn at_delimiter(&self, delimiter: &[char]) -> bool {
        !delimiter.is_empty() && self.chars[self.pos..].starts_with(delimiter)
    }

    fn skip(&mut self, count: usize) {
        for _ in 0..count {
            self.advance();
        }
    }

    fn here(&self) -> Span {
        Span::point(self.line, self.col)
    }

    // ─────────────────────────────────────────────────────────────
    // TEXT state
    // ─────────────────────────────────────────────────────────────

    fn line_break(&mut self) {
        if self.after_code {
            self.whitespace.clear();
        } else {
            self.buffer.push_str(&self.whitespace);
            self.whitespace.clear();
            self.buffer.push('\n');
        }
    }

    fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let (line, col) = self.text_start;
        let span = Span::new(line, col, self.line, self.col);
        let text = std::mem::take(&mut self.buffer);
        self.nodes.push(Node::new(NodeKind::Literal(text), span));
    }

    // ─────────────────────────────────────────────────────────────
    // CODE and STRING-IN-CODE states
    // ─────────────────────────────────────────────────────────────

    fn scan_tag(&mut self) -> Result<(), SyntaxError> {
        self.flush_buffer();
        let start = self.here();
        self.skip(self.open.len());

        let kind = match self.peek() {
            Some('=') => {
                if !self.whitespace.is_empty() {
                    let text = std::mem::take(&mut self.whitespace);
                    self.nodes.push(Node::new(NodeKind::Literal(text), start));
                }
                self.advance();
                self.after_code = false;
                TagKind::Print
            }
            Some('#') => {
                self.advance();
                self.after_code = true;
                TagKind::Include
            }
            _ => {
                self.after_code = true;
                TagKind::Code
            }
        };
        self.whitespace.clear();

        let body_start = self.here();
        let mut fragment = String::new();
        let body_end = loop {
            if self.at_delimiter(&self.close) {
                let end = self.here();
                self.skip(self.close.len());
                break end;
            }
            let Some(ch) = self.copy_char(&mut fragment) else {
                return Err(self.unterminated(start));
            };
            if ch == '\'' || ch == '"' {
                self.copy_string(ch, &mut fragment, start)?;
            }
        };

        let span = body_start.merge(body_end);
        let node = match kind {
            TagKind::Code => NodeKind::Code(fragment),
            TagKind::Print => NodeKind::Print(fragment),
            TagKind::Include => NodeKind::Include(fragment),
        };
        self.nodes.push(Node::new(node, span));
        self.text_start = (self.line, self.col);
        Ok(())
    }

    /// Copy a quoted string from a code fragment; the opening quote has
    /// already been copied. Delimiters inside the string are plain text.
    fn copy_string(
        &mut self,
        quote: char,
        fragment: &mut String,
        tag_start: Span,
    ) -> Result<(), SyntaxError> {
        loop {
            let Some(ch) = self.copy_char(fragment) else {
                return Err(self.unterminated(tag_start));
            };
            match ch {
                '\\' => {
                    if self.copy_char(fragment).is_none() {
                        return Err(self.unterminated(tag_start));
                    }
                }
                c if c == quote => return Ok(()),
                _ => {}
            }
        }
    }

    /// Move one character from the input into `fragment`, keeping `\r\n` intact.
    fn copy_char(&mut self, fragment: &mut String) -> Option<char> {
        let ch = self.advance()?;
        fragment.push(ch);
        if ch == '\r' && self.chars[self.pos - 1] == '\n' {
            fragment.push('\n');
        }
        Some(ch)
    }

    fn unterminated(&self, start: Span) -> SyntaxError {
        let file = SourceFile::new("", self.source);
        let source_line = file.line(start.start_line).unwrap_or_default();
        SyntaxError::new(UNTERMINATED_TAG, start, source_line)
    }
}
