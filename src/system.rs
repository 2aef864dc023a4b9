//! Process-wide state shared by every program: configuration, the builtin
//! namespace (including the prelude) and the diagnostic sink.

use crate::{
    analyser::deprecation::Deprecation,
    config::SystemConfig,
    diagnostics,
    error::{ErrorKind, Exception, LangResult},
    language::span::{Location, Source},
    program::Program,
    runtime::builtins::{self, Namespace},
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const PRELUDE: &str = include_str!("prelude.shape");

/// Receives errors, warnings and `print` output.
pub trait Sink: Send + Sync {
    fn error(&self, error: &Exception);
    fn warning(&self, warning: &Exception);
    fn print(&self, text: &str);
}

/// Writes to stderr; errors are rendered with their source snippets.
pub struct StderrSink;

impl Sink for StderrSink {
    fn error(&self, error: &Exception) {
        diagnostics::report_exception(error);
    }

    fn warning(&self, warning: &Exception) {
        eprintln!("WARNING: {warning}");
    }

    fn print(&self, text: &str) {
        eprintln!("{text}");
    }
}

/// Collects output in memory, for tests and embedding.
#[derive(Default)]
pub struct CaptureSink {
    lines: Mutex<Vec<String>>,
}

impl CaptureSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn push(&self, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(line);
    }
}

impl Sink for CaptureSink {
    fn error(&self, error: &Exception) {
        self.push(format!("ERROR: {error}"));
    }

    fn warning(&self, warning: &Exception) {
        self.push(format!("WARNING: {warning}"));
    }

    fn print(&self, text: &str) {
        self.push(text.to_string());
    }
}

pub struct System {
    config: SystemConfig,
    sink: Arc<dyn Sink>,
    namespace: Namespace,
    warned: Mutex<HashSet<Deprecation>>,
}

impl System {
    pub fn new(config: SystemConfig) -> LangResult<Self> {
        Self::with_sink(config, Arc::new(StderrSink))
    }

    /// Builds the builtin namespace, then evaluates the prelude against it
    /// and adds the prelude's definitions.
    pub fn with_sink(config: SystemConfig, sink: Arc<dyn Sink>) -> LangResult<Self> {
        let mut system = Self {
            config,
            sink,
            namespace: builtins::namespace(),
            warned: Mutex::new(HashSet::new()),
        };
        let source = Source::new("<prelude>", PRELUDE);
        let prelude = {
            let mut program = Program::new(source, &system);
            program.compile()?;
            program.eval()?
        };
        let Some(fields) = prelude.fields() else {
            return Err(Exception::new(ErrorKind::Custom(
                "the prelude did not evaluate to a module".into(),
            )));
        };
        debug!(definitions = fields.len(), "loaded prelude");
        system
            .namespace
            .extend(fields.into_iter().map(|(name, value)| (name.to_string(), value)));
        Ok(system)
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn print(&self, text: &str) {
        self.sink.print(text);
    }

    pub fn warning(&self, warning: Exception) {
        warn!(message = %warning.message(), "warning");
        self.sink.warning(&warning);
    }

    pub fn error(&self, error: &Exception) {
        debug!(message = %error.message(), "error");
        self.sink.error(error);
    }

    /// Reports use of a deprecated feature according to the configured
    /// level: 0 ignores it, 1 warns (once per feature unless verbose), 2 makes
    /// it an error.
    pub fn deprecate(&self, feature: Deprecation, loc: &Location) -> LangResult<()> {
        let exception = || {
            Exception::at(
                ErrorKind::Deprecated {
                    feature: feature.feature().to_string(),
                },
                loc,
            )
            .with_help(feature.help())
        };
        match self.config.deprecation_level() {
            0 => Ok(()),
            1 => {
                let first = self
                    .warned
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .insert(feature);
                if first || self.config.verbose {
                    self.warning(exception());
                }
                Ok(())
            }
            _ => Err(exception()),
        }
    }
}
