use crate::{
    analyser::{Analyser, Analysis},
    config::Target,
    error::{ErrorKind, Exception, LangResult},
    language::{
        parser::parse_program,
        span::{Location, Source},
    },
    runtime::{
        executor::ActionExecutor,
        frame::Frame,
        interpreter::{eval, exec},
        module::Module,
        value::Value,
    },
    shape::ShapeProgram,
    system::System,
};
use std::sync::Arc;
use tracing::debug;

/// A source text on its way through parsing, analysis and evaluation.
pub struct Program<'a> {
    system: &'a System,
    source: Arc<Source>,
    analysis: Option<Analysis>,
}

impl<'a> Program<'a> {
    pub fn new(source: Arc<Source>, system: &'a System) -> Self {
        Self {
            system,
            source,
            analysis: None,
        }
    }

    pub fn from_text(name: &str, text: &str, system: &'a System) -> Self {
        Self::new(Source::new(name, text), system)
    }

    pub fn source(&self) -> &Arc<Source> {
        &self.source
    }

    pub fn system(&self) -> &'a System {
        self.system
    }

    /// Parses and analyses the source.
    pub fn compile(&mut self) -> LangResult<()> {
        let phrase = parse_program(&self.source.text)
            .map_err(|errors| errors.to_exception(&self.source))?;
        let analysis = Analyser::new(self.system, self.source.clone()).analyse_program(&phrase)?;
        debug!(source = %self.source.name, kind = analysis.op.name(), "compiled");
        self.analysis = Some(analysis);
        Ok(())
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        self.analysis.as_ref()
    }

    /// Runs the compiled program. A program that is only statements
    /// evaluates to null.
    pub fn eval(&self) -> LangResult<Value> {
        let Some(analysis) = &self.analysis else {
            return Err(Exception::new(ErrorKind::Custom(format!(
                "{}: program has not been compiled",
                self.source.name
            ))));
        };
        let mut frame = Frame::new(self.system, analysis.nslots, Module::empty());
        if analysis.op.is_expression() {
            eval(&analysis.op, &mut frame)
        } else {
            exec(&analysis.op, &mut frame, &mut ActionExecutor)?;
            Ok(Value::Null)
        }
    }

    /// Evaluates the program and recognises a shape in the result.
    pub fn shape(&self) -> LangResult<Option<ShapeProgram>> {
        let value = self.eval()?;
        let loc = Location::new(self.source.clone(), Default::default());
        ShapeProgram::recognize(&value, &loc)
    }

    /// Compiles the program, then either prints its value (`None`) or
    /// exports its shape for `target`.
    pub fn execute(&mut self, target: Option<Target>) -> LangResult<String> {
        self.compile()?;
        let Some(target) = target else {
            return Ok(format!("{}\n", self.eval()?));
        };
        let Some(shape) = self.shape()? else {
            return Err(Exception::new(ErrorKind::Custom(format!(
                "{}: the program does not evaluate to a shape",
                self.source.name
            ))));
        };
        shape.export(self.system, target)
    }

    /// Like `execute`, with failures reported through the system's sink.
    pub fn run(&mut self, target: Option<Target>) -> Option<String> {
        match self.execute(target) {
            Ok(output) => Some(output),
            Err(error) => {
                self.system.error(&error);
                None
            }
        }
    }
}
