use miette::SourceSpan;
use std::{fmt, sync::Arc};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn merge(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn to_source_span(self) -> SourceSpan {
        (self.start, self.len()).into()
    }
}

/// A named text buffer: a file, a REPL line or the built-in prelude.
#[derive(Debug)]
pub struct Source {
    pub name: String,
    pub text: String,
}

impl Source {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            text: text.into(),
        })
    }

    pub fn slice(&self, span: Span) -> &str {
        self.text.get(span.start..span.end).unwrap_or("")
    }

    /// 1-based line and column of a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let mut line = 1;
        let mut col = 1;
        for (idx, ch) in self.text.char_indices() {
            if idx >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }

    pub fn space_before(&self, offset: usize) -> bool {
        offset == 0
            || self.text[..offset.min(self.text.len())]
                .chars()
                .next_back()
                .map_or(true, char::is_whitespace)
    }

    pub fn space_after(&self, offset: usize) -> bool {
        self.text
            .get(offset..)
            .and_then(|rest| rest.chars().next())
            .map_or(true, char::is_whitespace)
    }
}

/// A span inside a particular source, carried by IR nodes and exceptions.
#[derive(Clone, Debug)]
pub struct Location {
    pub source: Arc<Source>,
    pub span: Span,
}

impl Location {
    pub fn new(source: Arc<Source>, span: Span) -> Self {
        Self { source, span }
    }

    pub fn text(&self) -> &str {
        self.source.slice(self.span)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (line, col) = self.source.line_col(self.span.start);
        write!(f, "{}:{}:{}", self.source.name, line, col)
    }
}

pub trait Spanned {
    fn span(&self) -> Span;
}
