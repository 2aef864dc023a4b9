use crate::language::span::Location;
use std::fmt;
use thiserror::Error;

pub type LangResult<T> = Result<T, Exception>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ErrorKind {
    #[error("{0}")]
    Syntax(String),
    #[error("{name}: not defined")]
    NotDefined { name: String },
    #[error("{name}: multiply defined")]
    MultiplyDefined { name: String },
    #[error("{name}: not assignable")]
    NotAssignable { name: String },
    #[error("{name}: not assignable from inside an expression")]
    NotAssignableFromExpression { name: String },
    #[error("{what}: not a pattern")]
    NotAPattern { what: String },
    #[error("definitions cannot be mixed with statements")]
    MixedDefinitionsAndStatements,
    #[error("{what}: not an expression")]
    NotAnExpression { what: String },
    #[error("{what}: not an action")]
    NotAnAction { what: String },
    #[error("illegal recursive reference to {name}")]
    IllegalRecursiveReference { name: String },
    #[error("{0}")]
    Domain(String),
    #[error("{value}: not a function")]
    NotAFunction { value: String },
    #[error("argument does not match pattern: {reason}")]
    PatternMismatch { reason: String },
    #[error("missing a field named {name}")]
    MissingField { name: String },
    #[error("unmatched field {name}")]
    UnmatchedField { name: String },
    #[error("{left} and {right} cannot be proven equal")]
    NotProvablyEqual { left: String, right: String },
    #[error("assertion failed")]
    AssertionFailed,
    #[error("{what}: not supported by the Shape Compiler")]
    NotSupported { what: String },
    #[error("{what}: not a constant")]
    NotConstant { what: String },
    #[error("can't convert {left} and {right} to a common type")]
    TypeMismatch { left: String, right: String },
    #[error("{feature} is deprecated")]
    Deprecated { feature: String },
    #[error("{0}")]
    Custom(String),
}

/// A failure raised by analysis, evaluation or shape compilation.
///
/// `trace` holds the innermost location first; every function call the error
/// unwinds through appends its call site.
#[derive(Clone, Debug)]
pub struct Exception {
    pub kind: ErrorKind,
    pub help: Option<String>,
    pub trace: Vec<Location>,
}

impl Exception {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            help: None,
            trace: Vec::new(),
        }
    }

    pub fn at(kind: ErrorKind, loc: &Location) -> Self {
        Self {
            kind,
            help: None,
            trace: vec![loc.clone()],
        }
    }

    pub fn domain(message: impl Into<String>, loc: &Location) -> Self {
        Self::at(ErrorKind::Domain(message.into()), loc)
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Attaches `loc` if the error does not carry a location yet.
    pub fn located(mut self, loc: &Location) -> Self {
        if self.trace.is_empty() {
            self.trace.push(loc.clone());
        }
        self
    }

    pub fn push_call_site(mut self, loc: &Location) -> Self {
        let duplicate = self.trace.last().map_or(false, |last| {
            last.span == loc.span && std::sync::Arc::ptr_eq(&last.source, &loc.source)
        });
        if !duplicate {
            self.trace.push(loc.clone());
        }
        self
    }

    pub fn location(&self) -> Option<&Location> {
        self.trace.first()
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for loc in &self.trace {
            write!(f, "\nat {loc}: {}", loc.text().lines().next().unwrap_or(""))?;
        }
        if let Some(help) = &self.help {
            write!(f, "\nhelp: {help}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::span::{Source, Span};

    #[test]
    fn call_sites_are_appended_once() {
        let source = Source::new("t", "f(g 1)");
        let inner = Location::new(source.clone(), Span::new(2, 5));
        let outer = Location::new(source, Span::new(0, 6));
        let err = Exception::at(ErrorKind::AssertionFailed, &inner)
            .push_call_site(&inner)
            .push_call_site(&outer);
        assert_eq!(err.trace.len(), 2);
        assert_eq!(err.location().map(|loc| loc.span), Some(Span::new(2, 5)));
        assert!(err.to_string().starts_with("assertion failed\nat t:1:3"));
    }

    #[test]
    fn messages_name_the_culprit() {
        let err = Exception::new(ErrorKind::MissingField { name: "x".into() });
        assert_eq!(err.message(), "missing a field named x");
        let err = Exception::new(ErrorKind::TypeMismatch {
            left: "vec2".into(),
            right: "vec3".into(),
        });
        assert_eq!(err.message(), "can't convert vec2 and vec3 to a common type");
    }
}
