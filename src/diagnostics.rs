use crate::{config::ConfigError, error::Exception, language::span::Location};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use std::path::Path;
use thiserror::Error;

/// An exception rendered against its source text, with one related
/// diagnostic per call site it unwound through.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct ExceptionDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{label}")]
    span: Option<SourceSpan>,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
    #[related]
    calls: Vec<CallSite>,
}

#[derive(Debug, Error, Diagnostic)]
#[error("called from {location}")]
pub struct CallSite {
    #[source_code]
    src: NamedSource,
    #[label("call")]
    span: SourceSpan,
    location: String,
}

fn named_source(loc: &Location) -> NamedSource {
    NamedSource::new(loc.source.name.clone(), loc.source.text.clone())
}

impl ExceptionDiagnostic {
    pub fn from_exception(error: &Exception) -> Self {
        let (src, span) = match error.location() {
            Some(loc) => (named_source(loc), Some(loc.span.to_source_span())),
            None => (NamedSource::new("<unknown>", String::new()), None),
        };
        let calls = error
            .trace
            .iter()
            .skip(1)
            .map(|loc| CallSite {
                src: named_source(loc),
                span: loc.span.to_source_span(),
                location: loc.to_string(),
            })
            .collect();
        Self {
            src,
            span,
            help: error.help.clone(),
            message: error.message(),
            label: "here".into(),
            calls,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }
}

pub fn report_exception(error: &Exception) {
    let diagnostic = ExceptionDiagnostic::from_exception(error);
    eprintln!("ERROR: {:?}", Report::new(diagnostic));
}

pub fn report_config_error(error: &ConfigError) {
    eprintln!("ERROR: {error}");
}

pub fn report_io_error(path: &Path, error: &std::io::Error) {
    eprintln!("ERROR: failed to access {}: {}", path.display(), error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        language::span::{Source, Span},
    };

    #[test]
    fn call_sites_become_related_diagnostics() {
        let source = Source::new("t.shape", "f x = x / y;\nf 1");
        let inner = Location::new(source.clone(), Span::new(10, 11));
        let call = Location::new(source, Span::new(13, 16));
        let error = Exception::at(ErrorKind::NotDefined { name: "y".into() }, &inner)
            .push_call_site(&call)
            .with_help("define y first");
        let diagnostic = ExceptionDiagnostic::from_exception(&error);
        assert_eq!(diagnostic.to_string(), "y: not defined");
        assert_eq!(diagnostic.call_count(), 1);
        assert_eq!(diagnostic.help.as_deref(), Some("define y first"));
        assert_eq!(diagnostic.span, Some(SourceSpan::from((10, 1))));
    }

    #[test]
    fn exceptions_without_location_still_render() {
        let error = Exception::new(ErrorKind::Custom("boom".into()));
        let diagnostic = ExceptionDiagnostic::from_exception(&error);
        assert!(diagnostic.span.is_none());
        let rendered = format!("{:?}", Report::new(diagnostic));
        assert!(rendered.contains("boom"));
    }
}
