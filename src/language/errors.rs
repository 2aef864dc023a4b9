use crate::{
    error::{ErrorKind, Exception},
    language::span::{Location, Source, Span},
};
use std::sync::Arc;
use thiserror::Error;

/// A lexer or parser failure at `span`.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
    pub help: Option<String>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Locates the error in `source`, carrying over any help text.
    pub fn to_exception(&self, source: &Arc<Source>) -> Exception {
        let mut exception = Exception::at(
            ErrorKind::Syntax(self.message.clone()),
            &Location::new(source.clone(), self.span),
        );
        exception.help = self.help.clone();
        exception
    }
}

/// Every error the lexer collected, in source order. The parser stops at
/// its first error, so it only ever reports one.
#[derive(Clone, Debug, Error)]
#[error("{} syntax error(s)", errors.len())]
pub struct SyntaxErrors {
    pub errors: Vec<SyntaxError>,
}

impl SyntaxErrors {
    pub fn new(errors: Vec<SyntaxError>) -> Self {
        Self { errors }
    }

    /// Only the first error is reported; later ones are usually knock-on.
    pub fn to_exception(&self, source: &Arc<Source>) -> Exception {
        match self.errors.first() {
            Some(first) => first.to_exception(source),
            None => Exception::new(ErrorKind::Syntax("syntax error".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_becomes_the_exception() {
        let source = Source::new("bad.shape", "1 + ]\n");
        let errors = SyntaxErrors::new(vec![
            SyntaxError::new("unexpected `]`", Span::new(4, 5)).with_help("remove it"),
            SyntaxError::new("unexpected end of input", Span::new(6, 6)),
        ]);
        assert_eq!(errors.to_string(), "2 syntax error(s)");
        let exception = errors.to_exception(&source);
        assert_eq!(exception.kind, ErrorKind::Syntax("unexpected `]`".into()));
        assert_eq!(exception.help.as_deref(), Some("remove it"));
        assert!(exception.to_string().contains("bad.shape:1:"), "{exception}");

        let empty = SyntaxErrors::new(Vec::new()).to_exception(&source);
        assert_eq!(empty.kind, ErrorKind::Syntax("syntax error".into()));
    }
}
